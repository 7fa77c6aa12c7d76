use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Image attached to a listing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ListingImage {
    pub id: i32,
    pub listing_id: i32,
    /// Storage key relative to the upload directory.
    pub path: String,
    /// Lower-case hex MD5 of the uploaded bytes.
    pub hash: String,
    pub is_primary: bool,
    pub created_at: NaiveDateTime,
}

/// Image accepted by the intake pipeline and waiting to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewListingImage {
    pub path: String,
    pub hash: String,
    pub is_primary: bool,
}

impl NewListingImage {
    pub fn new(path: impl Into<String>, hash: impl Into<String>, is_primary: bool) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
            is_primary,
        }
    }
}
