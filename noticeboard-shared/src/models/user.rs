/// User model and database operations
///
/// Users are both the accounts that log in and the records the user-admin
/// screens manage. Deletion is a status transition — the row stays, stamped
/// with who deleted it and when — and email uniqueness only applies among
/// live rows (enforced by a partial unique index).
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('admin', 'user');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     name VARCHAR(30) NOT NULL,
///     email VARCHAR(255) NOT NULL,
///     password_hash VARCHAR(255) NOT NULL,
///     profile_image VARCHAR(255),
///     role user_role NOT NULL DEFAULT 'user',
///     phone VARCHAR(20),
///     address VARCHAR(255),
///     date_of_birth DATE,
///     created_user_id UUID NOT NULL,
///     updated_user_id UUID NOT NULL,
///     delete_user_id UUID,
///     deleted_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     is_staff BOOLEAN NOT NULL DEFAULT TRUE,
///     is_superuser BOOLEAN NOT NULL DEFAULT TRUE
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::pagination::{clamp_page, offset, Page, PAGE_SIZE};
use super::{Caller, Deletion};

/// User role, which decides listing visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sees every live record regardless of owner
    Admin,

    /// Sees only records they created
    User,
}

impl Role {
    /// Display label shown on listings
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::User => "User",
        }
    }
}

/// User model representing an account
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Login identity; unique among live users
    pub email: String,

    /// Argon2id PHC string, never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Permanent profile-image reference (e.g. `upload/avatar.png`)
    pub profile_image: Option<String>,

    pub role: Role,

    pub phone: Option<String>,

    pub address: Option<String>,

    pub date_of_birth: Option<NaiveDate>,

    /// Who created this account
    pub created_user_id: Uuid,

    /// Who last edited this account
    pub updated_user_id: Uuid,

    /// Soft-delete status
    pub deletion: Deletion,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub is_active: bool,

    pub is_staff: bool,

    pub is_superuser: bool,
}

impl sqlx::FromRow<'_, PgRow> for User {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let deletion =
            Deletion::from_columns(row.try_get("delete_user_id")?, row.try_get("deleted_at")?)
                .map_err(|e| sqlx::Error::ColumnDecode {
                    index: "deleted_at".to_string(),
                    source: Box::new(e),
                })?;

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            profile_image: row.try_get("profile_image")?,
            role: row.try_get("role")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
            date_of_birth: row.try_get("date_of_birth")?,
            created_user_id: row.try_get("created_user_id")?,
            updated_user_id: row.try_get("updated_user_id")?,
            deletion,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_active: row.try_get("is_active")?,
            is_staff: row.try_get("is_staff")?,
            is_superuser: row.try_get("is_superuser")?,
        })
    }
}

/// Input for creating a user through the admin create flow
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub profile_image: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Staged snapshot committed by the edit flow — every field is written
#[derive(Debug, Clone)]
pub struct UpdateUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub profile_image: Option<String>,
}

/// Validated field values carried by the user confirm flow
///
/// The create and edit flows share one snapshot shape; only the create flow
/// carries a password (hashed at commit time, never stored on the record in
/// the clear).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
}

/// Search filter for the user listing
#[derive(Debug, Clone, Default)]
pub struct UserSearch {
    /// Name-contains, case-insensitive
    pub name: Option<String>,

    /// Email-contains, case-insensitive
    pub email: Option<String>,

    /// Creation-date lower bound (inclusive)
    pub from_date: Option<NaiveDate>,

    /// Creation-date upper bound (inclusive, whole day)
    pub to_date: Option<NaiveDate>,
}

/// One row of the user listing, with display fields resolved
#[derive(Debug, Clone, Serialize)]
pub struct UserListRow {
    #[serde(flatten)]
    pub user: User,

    /// Role rendered for display (`Admin`/`User`)
    pub role_label: &'static str,

    /// Creator's display name; empty when the creator no longer resolves
    pub created_by_name: String,
}

impl sqlx::FromRow<'_, PgRow> for UserListRow {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let user = User::from_row(row)?;
        let role_label = user.role.label();
        Ok(Self {
            user,
            role_label,
            created_by_name: row.try_get("created_by_name")?,
        })
    }
}

/// Detail payload with creator/updater names resolved
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,

    pub created_user_name: String,

    pub updated_user_name: String,
}

const USER_COLUMNS: &str = "id, name, email, password_hash, profile_image, role, phone, address, \
     date_of_birth, created_user_id, updated_user_id, delete_user_id, deleted_at, \
     created_at, updated_at, is_active, is_staff, is_superuser";

impl User {
    /// The identity this account acts as
    pub fn caller(&self) -> Caller {
        Caller {
            id: self.id,
            role: self.role,
        }
    }

    /// Creates a user through the admin create flow
    ///
    /// The acting admin is stamped as creator and updater.
    ///
    /// # Errors
    ///
    /// Returns an error on a duplicate live email (partial unique index) or
    /// a database failure.
    pub async fn create(pool: &PgPool, actor: Uuid, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, profile_image, role,
                               phone, address, date_of_birth,
                               created_user_id, updated_user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10, NOW(), NOW())
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(data.name)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.profile_image)
            .bind(data.role)
            .bind(data.phone)
            .bind(data.address)
            .bind(data.date_of_birth)
            .bind(actor)
            .fetch_one(pool)
            .await
    }

    /// Creates a self-registered account (signup)
    ///
    /// The new account is its own creator and updater and gets the
    /// non-privileged role.
    pub async fn register(
        pool: &PgPool,
        name: String,
        email: String,
        password_hash: String,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let query = format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, role,
                               created_user_id, updated_user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'user', $1, $1, NOW(), NOW())
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .fetch_one(pool)
            .await
    }

    /// Finds a user by id, deleted or not
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a live (non-deleted) user by id
    pub async fn find_active_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE id = $1 AND delete_user_id IS NULL AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a live user by login email
    pub async fn find_active_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE email = $1 AND delete_user_id IS NULL AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Commits an edit-flow snapshot onto the user named by `id`
    ///
    /// Every field is written from the snapshot; the actor is stamped as
    /// updater. Returns `None` if the user does not exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        actor: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users
            SET name = $2, email = $3, role = $4, phone = $5, address = $6,
                date_of_birth = $7, profile_image = $8,
                updated_user_id = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(data.name)
            .bind(data.email)
            .bind(data.role)
            .bind(data.phone)
            .bind(data.address)
            .bind(data.date_of_birth)
            .bind(data.profile_image)
            .bind(actor)
            .fetch_optional(pool)
            .await
    }

    /// Replaces the stored password hash (self-service reset)
    pub async fn update_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Soft-deletes a user, stamping the actor and current time
    ///
    /// Already-deleted rows are left untouched.
    pub async fn soft_delete(pool: &PgPool, id: Uuid, actor: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
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

    /// Lists the users the caller may see, filtered, ordered, and paginated
    ///
    /// Live rows only; a non-privileged caller additionally sees only rows
    /// they created. Name/email filters combine with OR, the date bounds
    /// with AND. Ordered by `updated_at` descending, five rows per page,
    /// out-of-range pages clamped.
    pub async fn list_visible(
        pool: &PgPool,
        caller: &Caller,
        search: &UserSearch,
        page: u32,
    ) -> Result<Page<UserListRow>, sqlx::Error> {
        let owner = match caller.role {
            Role::Admin => None,
            Role::User => Some(caller.id),
        };

        let predicate = r#"
            u.delete_user_id IS NULL AND u.deleted_at IS NULL
            AND ($1::uuid IS NULL OR u.created_user_id = $1)
            AND (($2::text IS NULL AND $3::text IS NULL)
                 OR ($2::text IS NOT NULL AND u.name ILIKE '%' || $2 || '%')
                 OR ($3::text IS NOT NULL AND u.email ILIKE '%' || $3 || '%'))
            AND ($4::date IS NULL OR u.created_at::date >= $4)
            AND ($5::date IS NULL OR u.created_at::date <= $5)
        "#;

        let count_query = format!("SELECT COUNT(*) FROM users u WHERE {predicate}");
        let (total,): (i64,) = sqlx::query_as(&count_query)
            .bind(owner)
            .bind(search.name.as_deref())
            .bind(search.email.as_deref())
            .bind(search.from_date)
            .bind(search.to_date)
            .fetch_one(pool)
            .await?;

        let number = clamp_page(page, total);

        let select_query = format!(
            r#"
            SELECT u.id, u.name, u.email, u.password_hash, u.profile_image, u.role,
                   u.phone, u.address, u.date_of_birth, u.created_user_id,
                   u.updated_user_id, u.delete_user_id, u.deleted_at,
                   u.created_at, u.updated_at, u.is_active, u.is_staff, u.is_superuser,
                   COALESCE(c.name, '') AS created_by_name
            FROM users u
            LEFT JOIN users c ON c.id = u.created_user_id
            WHERE {predicate}
            ORDER BY u.updated_at DESC
            LIMIT $6 OFFSET $7
            "#
        );

        let items = sqlx::query_as::<_, UserListRow>(&select_query)
            .bind(owner)
            .bind(search.name.as_deref())
            .bind(search.email.as_deref())
            .bind(search.from_date)
            .bind(search.to_date)
            .bind(PAGE_SIZE)
            .bind(offset(number))
            .fetch_all(pool)
            .await?;

        Ok(Page::new(items, number, total))
    }

    /// Fetches a user with creator/updater display names resolved
    ///
    /// Names fall back to the empty string when the referenced account is
    /// gone.
    pub async fn find_detail(pool: &PgPool, id: Uuid) -> Result<Option<UserDetail>, sqlx::Error> {
        let query = r#"
            SELECT u.id, u.name, u.email, u.password_hash, u.profile_image, u.role,
                   u.phone, u.address, u.date_of_birth, u.created_user_id,
                   u.updated_user_id, u.delete_user_id, u.deleted_at,
                   u.created_at, u.updated_at, u.is_active, u.is_staff, u.is_superuser,
                   COALESCE(c.name, '') AS created_user_name,
                   COALESCE(m.name, '') AS updated_user_name
            FROM users u
            LEFT JOIN users c ON c.id = u.created_user_id
            LEFT JOIN users m ON m.id = u.updated_user_id
            WHERE u.id = $1
        "#;

        let row = sqlx::query(query).bind(id).fetch_optional(pool).await?;

        row.map(|row| {
            let user = User::from_row(&row)?;
            Ok(UserDetail {
                user,
                created_user_name: row.try_get("created_user_name")?,
                updated_user_name: row.try_get("updated_user_name")?,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_labels() {
        assert_eq!(Role::Admin.label(), "Admin");
        assert_eq!(Role::User.label(), "User");
    }

    #[test]
    fn test_caller_from_user_fields() {
        let id = Uuid::new_v4();
        let caller = Caller {
            id,
            role: Role::User,
        };
        assert_eq!(caller.id, id);
        assert_eq!(caller.role, Role::User);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            profile_image: None,
            role: Role::User,
            phone: None,
            address: None,
            date_of_birth: None,
            created_user_id: Uuid::new_v4(),
            updated_user_id: Uuid::new_v4(),
            deletion: Deletion::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            is_active: true,
            is_staff: true,
            is_superuser: true,
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("test@example.com"));
    }

    // Query behavior (visibility narrowing, ordering, clamping against real
    // data) is covered by the API integration tests.
}
