use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::points::engine::Medals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Child,
    Guardian,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub parent_id: Option<Uuid>,
    pub current_streak: i32,
    pub medal_bronze: bool,
    pub medal_silver: bool,
    pub medal_gold: bool,
    pub medal_diamond: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const USER_COLUMNS: &str = r#"
    id, email, display_name, password_hash, role, parent_id, current_streak,
    medal_bronze, medal_silver, medal_gold, medal_diamond, created_at, updated_at
"#;

impl User {
    pub fn medals(&self) -> Medals {
        Medals {
            bronze: self.medal_bronze,
            silver: self.medal_silver,
            gold: self.medal_gold,
            diamond: self.medal_diamond,
        }
    }

    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password. Linking to a guardian is done
    /// separately inside the same transaction, see [`link_child`].
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        email: &str,
        display_name: &str,
        password_hash: &str,
        role: Role,
        parent_id: Option<Uuid>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, display_name, password_hash, role, parent_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(display_name)
        .bind(password_hash)
        .bind(role)
        .bind(parent_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(user)
    }
}

/// Record the guardian-side of the relationship. The child side is the
/// `parent_id` column written at creation.
pub async fn link_child(
    tx: &mut Transaction<'_, Postgres>,
    guardian_id: Uuid,
    child_id: Uuid,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO guardian_children (guardian_id, child_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(guardian_id)
    .bind(child_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// True only when both directions of the relationship agree: the child's
/// back-reference points at the guardian AND the guardian's child set
/// contains the child. The two can drift; neither alone is trusted.
pub async fn is_guardian_of(db: &PgPool, guardian_id: Uuid, child_id: Uuid) -> anyhow::Result<bool> {
    let authorized: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM users c
            JOIN guardian_children gc ON gc.child_id = c.id AND gc.guardian_id = $1
            WHERE c.id = $2 AND c.parent_id = $1
        )
        "#,
    )
    .bind(guardian_id)
    .bind(child_id)
    .fetch_one(db)
    .await?;
    Ok(authorized)
}
