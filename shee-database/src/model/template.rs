use sqlx::FromRow;

/// A reusable piece of generated content (welcome or morning message).
#[derive(Debug, Clone, FromRow)]
pub struct Template {
    pub id: i64,
    pub content: String,
    pub used_count: i64,
    pub last_used_at: Option<i64>,
}

/// A warning template, tagged with the violation type it responds to.
#[derive(Debug, Clone, FromRow)]
pub struct WarningTemplate {
    pub id: i64,
    pub violation_type: String,
    pub content: String,
    pub severity: i32,
    pub used_count: i64,
    pub last_used_at: Option<i64>,
}
