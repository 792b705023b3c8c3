use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Category {
    Exercise,
    Reading,
    Chores,
    Learning,
    Creativity,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Exercise => "exercise",
            Category::Reading => "reading",
            Category::Chores => "chores",
            Category::Learning => "learning",
            Category::Creativity => "creativity",
            Category::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Catalog entry a daily instance is stamped from. The core only reads
/// these; catalog management happens elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskTemplate {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub activity: String,
    pub difficulty: Difficulty,
    pub base_points: i32,
    pub estimated_minutes: i32,
    pub requires_evidence: bool,
    pub evidence_kinds: Vec<String>,
    pub repeatable: bool,
    pub created_by: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const TEMPLATE_COLUMNS: &str = r#"
    id, title, description, category, activity, difficulty, base_points,
    estimated_minutes, requires_evidence, evidence_kinds, repeatable,
    created_by, created_at, updated_at
"#;

pub async fn list(db: &PgPool) -> anyhow::Result<Vec<TaskTemplate>> {
    let rows = sqlx::query_as::<_, TaskTemplate>(&format!(
        "SELECT {TEMPLATE_COLUMNS} FROM task_templates ORDER BY category, activity, title"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<TaskTemplate>> {
    let row = sqlx::query_as::<_, TaskTemplate>(&format!(
        "SELECT {TEMPLATE_COLUMNS} FROM task_templates WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}
