use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Catalog entry. Price is stored in the currency's minor unit (pesewas) so
/// monetary comparisons never touch floating point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub price_minor: i64,
    pub duration_minutes: i32,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}
