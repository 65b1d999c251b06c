/// Post CSV import and export
///
/// # Endpoints
///
/// - `GET/POST /csv/import/` - Bulk post import from an uploaded CSV
/// - `GET /post/list/download` - Full post export as a CSV attachment
///
/// Import is all-or-nothing at the shape level: every row (header included)
/// must have exactly three columns, and nothing is written if any row does
/// not. The first row is treated as a header and skipped; each remaining
/// `(title, description, status)` row becomes a post owned by the importer.
///
/// Export covers every post — all owners, soft-deleted included — with a
/// fixed column order.

use axum::{
    extract::{Extension, Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use noticeboard_shared::models::post::{Post, PostStatus};
use noticeboard_shared::models::user::User;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    forms::MultipartForm,
    routes::found,
};

/// Shape-validation failure message shown to the importer
pub const IMPORT_COLUMN_MESSAGE: &str = "Post upload csv must have 3 columns";

/// Export column order; the first line of every download
pub const EXPORT_HEADER: [&str; 10] = [
    "id",
    "title",
    "description",
    "status",
    "created_user_id",
    "updated_user_id",
    "delete_user_id",
    "deleted_at",
    "created_at",
    "updated_at",
];

/// Content types accepted for an uploaded CSV
const CSV_CONTENT_TYPES: [&str; 2] = ["text/csv", "application/vnd.ms-excel"];

/// CSV import page context
#[derive(Debug, Serialize)]
pub struct CsvImportPage {
    /// Import failure message, empty when the page is fresh
    pub err_message: String,
}

/// One validated data row of an import file
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub title: String,
    pub description: String,
    pub status: PostStatus,
}

/// Renders the empty import page
pub async fn import_page() -> Json<CsvImportPage> {
    Json(CsvImportPage {
        err_message: String::new(),
    })
}

/// Handles an import upload
pub async fn import_submit(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let form = MultipartForm::parse(multipart).await?;

    let Some(file) = form.file("csv_file") else {
        return Ok(import_message("Please choose a file"));
    };

    let is_csv = file
        .content_type
        .as_deref()
        .is_some_and(|ct| CSV_CONTENT_TYPES.contains(&ct));
    if !is_csv {
        return Ok(import_message("Please choose csv format"));
    }

    let rows = match parse_import_rows(&file.bytes) {
        Ok(rows) => rows,
        Err(message) => return Ok(import_message(message)),
    };

    let count = rows.len();
    for row in rows {
        Post::create(&state.db, user.id, row.title, row.description, row.status).await?;
    }

    tracing::info!(count, importer = %user.id, "CSV import completed");
    Ok(found("/"))
}

fn import_message(message: &str) -> Response {
    Json(CsvImportPage {
        err_message: message.to_string(),
    })
    .into_response()
}

/// Validates the shape of an import file and extracts its data rows
///
/// Every row must have exactly three columns; the check runs over the whole
/// file before any row is accepted, so a malformed row aborts the entire
/// import. The first row is a header and is skipped. An empty file fails
/// the same way a malformed one does.
pub fn parse_import_rows(bytes: &[u8]) -> Result<Vec<ImportRow>, &'static str> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|_| IMPORT_COLUMN_MESSAGE)?;
        if record.len() != 3 {
            return Err(IMPORT_COLUMN_MESSAGE);
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(IMPORT_COLUMN_MESSAGE);
    }

    Ok(records
        .into_iter()
        .skip(1)
        .map(|record| ImportRow {
            title: record[0].to_string(),
            description: record[1].to_string(),
            status: PostStatus::from_csv_token(&record[2]),
        })
        .collect())
}

/// Streams the full post list as a CSV attachment
pub async fn download(State(state): State<AppState>) -> ApiResult<Response> {
    let posts = Post::list_all_for_export(&state.db).await?;

    let body = build_export(&posts)
        .map_err(|e| ApiError::InternalError(format!("CSV export failed: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"post_list.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}

/// Renders posts into the export CSV, header first
pub fn build_export(posts: &[Post]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;

    for post in posts {
        let (delete_user_id, deleted_at) = post.deletion.columns();
        writer.write_record(&[
            post.id.to_string(),
            post.title.clone(),
            post.description.clone(),
            post.status.as_str().to_string(),
            post.created_user_id.to_string(),
            post.updated_user_id.to_string(),
            delete_user_id.map(|id| id.to_string()).unwrap_or_default(),
            deleted_at.map(|at| at.to_rfc3339()).unwrap_or_default(),
            post.created_at.to_rfc3339(),
            post.updated_at.to_rfc3339(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use noticeboard_shared::models::Deletion;
    use uuid::Uuid;

    fn sample_post(deleted: bool) -> Post {
        let owner = Uuid::new_v4();
        Post {
            id: Uuid::new_v4(),
            title: "A title".to_string(),
            description: "A description".to_string(),
            status: PostStatus::Active,
            user_id: Some(owner),
            created_user_id: owner,
            updated_user_id: owner,
            deletion: if deleted {
                Deletion::Deleted {
                    by: owner,
                    at: Utc::now(),
                }
            } else {
                Deletion::Active
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_header_plus_rows() {
        let csv = b"title,description,status\nFirst,Body one,1\nSecond,Body two,0\n";
        let rows = parse_import_rows(csv).expect("well-formed file");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "First");
        assert_eq!(rows[0].status, PostStatus::Active);
        assert_eq!(rows[1].status, PostStatus::Inactive);
    }

    #[test]
    fn test_parse_rejects_wrong_column_count() {
        let csv = b"title,description,status\nFirst,Body one\n";
        assert_eq!(parse_import_rows(csv), Err(IMPORT_COLUMN_MESSAGE));

        let csv = b"title,description,status\nFirst,Body,1,extra\n";
        assert_eq!(parse_import_rows(csv), Err(IMPORT_COLUMN_MESSAGE));
    }

    #[test]
    fn test_parse_rejects_malformed_header() {
        let csv = b"only,two\nFirst,Body one,1\n";
        assert_eq!(parse_import_rows(csv), Err(IMPORT_COLUMN_MESSAGE));
    }

    #[test]
    fn test_parse_rejects_empty_file() {
        assert_eq!(parse_import_rows(b""), Err(IMPORT_COLUMN_MESSAGE));
    }

    #[test]
    fn test_parse_header_only_imports_nothing() {
        let rows = parse_import_rows(b"title,description,status\n").expect("header only");
        assert!(rows.is_empty());
    }

    #[test]
    fn test_export_header_row() {
        let body = build_export(&[]).expect("export");
        assert_eq!(
            body.lines().next().unwrap(),
            "id,title,description,status,created_user_id,updated_user_id,delete_user_id,deleted_at,created_at,updated_at"
        );
    }

    #[test]
    fn test_export_includes_deleted_posts() {
        let live = sample_post(false);
        let deleted = sample_post(true);
        let body = build_export(&[live.clone(), deleted.clone()]).expect("export");

        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains(&live.id.to_string()));
        assert!(lines[2].contains(&deleted.id.to_string()));

        // The deleted row carries its deleter; the live row leaves the
        // column empty.
        let live_fields: Vec<&str> = lines[1].split(',').collect();
        let deleted_fields: Vec<&str> = lines[2].split(',').collect();
        assert_eq!(live_fields[6], "");
        assert!(!deleted_fields[6].is_empty());
        assert_eq!(live_fields[3], "active");
    }
}
