/// Post model and database operations
///
/// Posts are the board's content records. They share the soft-delete
/// convention with users and carry the same audit stamps; the authoring
/// user is additionally linked by a nullable foreign key so a removed
/// account degrades to an unresolvable name rather than a broken row.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE post_status AS ENUM ('active', 'inactive');
///
/// CREATE TABLE posts (
///     id UUID PRIMARY KEY,
///     title VARCHAR(255) NOT NULL,
///     description VARCHAR(255) NOT NULL,
///     status post_status NOT NULL DEFAULT 'active',
///     user_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_user_id UUID NOT NULL,
///     updated_user_id UUID NOT NULL,
///     delete_user_id UUID,
///     deleted_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::pagination::{clamp_page, offset, Page, PAGE_SIZE};
use super::{Caller, Deletion};
use super::user::Role;

/// Post publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "post_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Active,
    Inactive,
}

impl PostStatus {
    /// Decodes the edit form's status checkbox: present means active
    ///
    /// Checkbox absence is only visible as a missing form field, so the
    /// decision is made once here and the resulting value travels in the
    /// staged snapshot.
    pub fn from_checkbox(present: bool) -> Self {
        if present {
            PostStatus::Active
        } else {
            PostStatus::Inactive
        }
    }

    /// Decodes a CSV status token
    ///
    /// Accepts `active` and the legacy numeric `1` as active; anything else
    /// is inactive.
    pub fn from_csv_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "active" | "1" => PostStatus::Active,
            _ => PostStatus::Inactive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Active => "active",
            PostStatus::Inactive => "inactive",
        }
    }
}

/// Post model
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: Uuid,

    /// Headline, non-empty, at most 255 characters
    pub title: String,

    /// Body text, non-empty, at most 255 characters
    pub description: String,

    pub status: PostStatus,

    /// Authoring user; `None` once that account is physically gone
    pub user_id: Option<Uuid>,

    /// Who created this post
    pub created_user_id: Uuid,

    /// Who last edited this post
    pub updated_user_id: Uuid,

    /// Soft-delete status
    pub deletion: Deletion,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, PgRow> for Post {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let deletion =
            Deletion::from_columns(row.try_get("delete_user_id")?, row.try_get("deleted_at")?)
                .map_err(|e| sqlx::Error::ColumnDecode {
                    index: "deleted_at".to_string(),
                    source: Box::new(e),
                })?;

        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            status: row.try_get("status")?,
            user_id: row.try_get("user_id")?,
            created_user_id: row.try_get("created_user_id")?,
            updated_user_id: row.try_get("updated_user_id")?,
            deletion,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Validated field values carried by the post confirm flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub description: String,

    /// Decoded from the status checkbox at stage time; creates always
    /// commit as active
    pub status: PostStatus,
}

/// Detail payload with creator/updater names resolved
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,

    pub created_user_name: String,

    pub updated_user_name: String,
}

const POST_COLUMNS: &str = "id, title, description, status, user_id, created_user_id, \
     updated_user_id, delete_user_id, deleted_at, created_at, updated_at";

impl Post {
    /// Creates a post owned by the acting user
    pub async fn create(
        pool: &PgPool,
        actor: Uuid,
        title: String,
        description: String,
        status: PostStatus,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO posts (id, title, description, status, user_id,
                               created_user_id, updated_user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5, $5, NOW(), NOW())
            RETURNING {POST_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Post>(&query)
            .bind(Uuid::new_v4())
            .bind(title)
            .bind(description)
            .bind(status)
            .bind(actor)
            .fetch_one(pool)
            .await
    }

    /// Finds a post by id, deleted or not
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        sqlx::query_as::<_, Post>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Commits an edit-flow snapshot onto the post named by `id`
    ///
    /// The actor becomes the post's author and updater, matching the
    /// original system's edit semantics. Returns `None` if the post does
    /// not exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        actor: Uuid,
        draft: &PostDraft,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE posts
            SET title = $2, description = $3, status = $4,
                user_id = $5, updated_user_id = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Post>(&query)
            .bind(id)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(draft.status)
            .bind(actor)
            .fetch_optional(pool)
            .await
    }

    /// Soft-deletes a post, stamping the actor and current time
    pub async fn soft_delete(pool: &PgPool, id: Uuid, actor: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET delete_user_id = $2, deleted_at = NOW()
            WHERE id = $1 AND delete_user_id IS NULL AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(actor)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists the posts the caller may see, filtered, ordered, and paginated
    ///
    /// Live rows only; a non-privileged caller additionally sees only rows
    /// they created. The keyword matches title or description as a
    /// case-insensitive substring. Ordered by `updated_at` descending, five
    /// rows per page, out-of-range pages clamped.
    pub async fn list_visible(
        pool: &PgPool,
        caller: &Caller,
        keyword: Option<&str>,
        page: u32,
    ) -> Result<Page<Post>, sqlx::Error> {
        let owner = match caller.role {
            Role::Admin => None,
            Role::User => Some(caller.id),
        };

        let predicate = r#"
            delete_user_id IS NULL AND deleted_at IS NULL
            AND ($1::uuid IS NULL OR created_user_id = $1)
            AND ($2::text IS NULL
                 OR title ILIKE '%' || $2 || '%'
                 OR description ILIKE '%' || $2 || '%')
        "#;

        let count_query = format!("SELECT COUNT(*) FROM posts WHERE {predicate}");
        let (total,): (i64,) = sqlx::query_as(&count_query)
            .bind(owner)
            .bind(keyword)
            .fetch_one(pool)
            .await?;

        let number = clamp_page(page, total);

        let select_query = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE {predicate}
            ORDER BY updated_at DESC
            LIMIT $3 OFFSET $4
            "#
        );

        let items = sqlx::query_as::<_, Post>(&select_query)
            .bind(owner)
            .bind(keyword)
            .bind(PAGE_SIZE)
            .bind(offset(number))
            .fetch_all(pool)
            .await?;

        Ok(Page::new(items, number, total))
    }

    /// Fetches a post with creator/updater display names resolved
    pub async fn find_detail(pool: &PgPool, id: Uuid) -> Result<Option<PostDetail>, sqlx::Error> {
        let query = r#"
            SELECT p.id, p.title, p.description, p.status, p.user_id,
                   p.created_user_id, p.updated_user_id, p.delete_user_id,
                   p.deleted_at, p.created_at, p.updated_at,
                   COALESCE(a.name, '') AS created_user_name,
                   COALESCE(m.name, '') AS updated_user_name
            FROM posts p
            LEFT JOIN users a ON a.id = p.user_id
            LEFT JOIN users m ON m.id = p.updated_user_id
            WHERE p.id = $1
        "#;

        let row = sqlx::query(query).bind(id).fetch_optional(pool).await?;

        row.map(|row| {
            let post = Post::from_row(&row)?;
            Ok(PostDetail {
                post,
                created_user_name: row.try_get("created_user_name")?,
                updated_user_name: row.try_get("updated_user_name")?,
            })
        })
        .transpose()
    }

    /// Every post, newest-edited first, for the CSV export
    ///
    /// The export deliberately ignores ownership and soft-delete status.
    pub async fn list_all_for_export(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {POST_COLUMNS} FROM posts ORDER BY updated_at DESC");
        sqlx::query_as::<_, Post>(&query).fetch_all(pool).await
    }
}
