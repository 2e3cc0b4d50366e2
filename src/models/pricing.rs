use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A price category a schedule may reference instead of a fixed amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceCategory {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
}

/// One dated price window within a category. Windows are closed when a new
/// price takes effect; the open-ended row is the current price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceValue {
    pub id: Uuid,
    pub category_id: Uuid,
    pub amount: f64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}
