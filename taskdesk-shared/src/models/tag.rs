/// Tag model and the `task_tags` association
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tags (
///     id BIGSERIAL PRIMARY KEY,
///     name VARCHAR(50) NOT NULL,
///     color VARCHAR(7) NOT NULL DEFAULT '',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
///
/// CREATE TABLE task_tags (
///     task_id BIGINT NOT NULL REFERENCES tasks(id),
///     tag_id BIGINT NOT NULL REFERENCES tags(id),
///     PRIMARY KEY (task_id, tag_id)
/// );
/// ```
///
/// Association writes take a `&mut PgConnection` so they can run inside the
/// task transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use validator::{Validate, ValidationError};

const TAG_COLUMNS: &str = "id, name, color, created_at, updated_at";

/// A label that can be attached to any number of tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,

    /// Display color as `#RRGGBB`, or empty
    pub color: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tag creation payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1 to 50 characters"))]
    pub name: String,

    #[serde(default)]
    #[validate(custom(function = "validate_color"))]
    pub color: String,
}

/// Input for inserting a tag row
#[derive(Debug, Clone)]
pub struct NewTag {
    pub name: String,
    pub color: String,
}

impl From<CreateTagRequest> for NewTag {
    fn from(req: CreateTagRequest) -> Self {
        Self {
            name: req.name,
            color: req.color,
        }
    }
}

/// Accepts an empty color or `#` followed by six hex digits
fn validate_color(color: &str) -> Result<(), ValidationError> {
    if color.is_empty() {
        return Ok(());
    }

    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());

    if valid {
        Ok(())
    } else {
        let mut error = ValidationError::new("color");
        error.message = Some("Color must look like #RRGGBB".into());
        Err(error)
    }
}

/// A tag row joined with the task it is attached to
#[derive(Debug, sqlx::FromRow)]
struct TaskTagRow {
    task_id: i64,
    #[sqlx(flatten)]
    tag: Tag,
}

impl Tag {
    /// Inserts a new tag
    pub async fn create(pool: &PgPool, data: NewTag) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Tag>(&format!(
            "INSERT INTO tags (name, color) VALUES ($1, $2) RETURNING {TAG_COLUMNS}"
        ))
        .bind(data.name)
        .bind(data.color)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(&format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(&format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE name = $1 AND deleted_at IS NULL"
        ))
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    /// Lists live tags ordered by name
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(&format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE deleted_at IS NULL ORDER BY name, id"
        ))
        .fetch_all(pool)
        .await
    }

    /// Keeps only the IDs that name a live tag
    ///
    /// Unknown and soft-deleted IDs are dropped without error.
    pub async fn resolve_ids(conn: &mut PgConnection, ids: &[i64]) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM tags WHERE id = ANY($1) AND deleted_at IS NULL ORDER BY id",
        )
        .bind(ids)
        .fetch_all(conn)
        .await
    }

    /// Links already-resolved tags to a task
    pub async fn link_to_task(
        conn: &mut PgConnection,
        task_id: i64,
        tag_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        if tag_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO task_tags (task_id, tag_id) \
             SELECT $1, tag_id FROM UNNEST($2::BIGINT[]) AS tag_id \
             ON CONFLICT DO NOTHING",
        )
        .bind(task_id)
        .bind(tag_ids)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Removes every tag link of a task
    pub async fn clear_for_task(conn: &mut PgConnection, task_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM task_tags WHERE task_id = $1")
            .bind(task_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Loads the live tags of several tasks at once
    ///
    /// Returns `(task_id, tag)` pairs ordered by task, then tag ID.
    pub async fn for_tasks(pool: &PgPool, task_ids: &[i64]) -> Result<Vec<(i64, Tag)>, sqlx::Error> {
        let rows = sqlx::query_as::<_, TaskTagRow>(
            "SELECT tt.task_id, t.id, t.name, t.color, t.created_at, t.updated_at \
             FROM task_tags tt \
             JOIN tags t ON t.id = tt.tag_id \
             WHERE tt.task_id = ANY($1) AND t.deleted_at IS NULL \
             ORDER BY tt.task_id, t.id",
        )
        .bind(task_ids)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|row| (row.task_id, row.tag)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_color() {
        assert!(validate_color("").is_ok());
        assert!(validate_color("#1a2B3c").is_ok());
        assert!(validate_color("1a2b3c").is_err());
        assert!(validate_color("#1a2b3").is_err());
        assert!(validate_color("#1a2b3g").is_err());
    }

    #[test]
    fn test_create_request_validation() {
        let req = CreateTagRequest {
            name: "work".to_string(),
            color: "#ff0000".to_string(),
        };
        assert!(req.validate().is_ok());

        let req = CreateTagRequest {
            name: String::new(),
            color: "red".to_string(),
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("color"));
    }
}
