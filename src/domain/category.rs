use serde::{Deserialize, Serialize};

/// Listing category from the static reference table.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i32,
    pub name: String,
}
