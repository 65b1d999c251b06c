/// Redis utilities
///
/// The session store is the only Redis consumer; this module provides the
/// connection-managed client it is built on.

pub mod client;

pub use client::{RedisClient, RedisClientError, RedisConfig};
