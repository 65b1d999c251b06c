/// Database utilities
///
/// - `pool`: Connection pool creation and health checks
/// - `migrations`: Embedded migration runner

pub mod migrations;
pub mod pool;
