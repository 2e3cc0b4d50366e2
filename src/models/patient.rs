use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimal patient directory row. Patient record keeping lives outside this
/// crate; these fields exist to label calendar events and anchor foreign keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
}
