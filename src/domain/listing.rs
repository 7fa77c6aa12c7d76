use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::listing_image::{ListingImage, NewListingImage};
use crate::pagination::Pagination;

/// Classified ad owned by a panel user.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Listing {
    /// Unique identifier of the listing.
    pub id: i32,
    /// Identifier of the user that published the listing.
    pub owner_id: i32,
    pub category_id: i32,
    pub city_id: i32,
    pub commune_id: i32,
    /// Advertiser age in years.
    pub age: i32,
    pub title: String,
    pub description: String,
    /// Phone number in canonical Chilean format (`+56 9 1234 5678`).
    pub phone: String,
    /// Whether the phone accepts WhatsApp contact.
    pub whatsapp: bool,
    pub email: String,
    /// Set by moderation once the listing is approved.
    pub is_active: bool,
    /// Promoted listings are shown first on the public site.
    pub is_top: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Validated scalar fields shared by the create and update flows.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingDetails {
    pub category_id: i32,
    pub city_id: i32,
    pub commune_id: i32,
    pub age: i32,
    pub title: String,
    pub description: String,
    pub phone: String,
    pub whatsapp: bool,
    pub email: String,
}

/// Payload required to insert a new listing.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub owner_id: i32,
    pub details: ListingDetails,
}

impl NewListing {
    pub fn new(owner_id: i32, details: ListingDetails) -> Self {
        Self { owner_id, details }
    }
}

/// Scalar field replacement applied by the update flow.
#[derive(Debug, Clone)]
pub struct UpdateListing {
    pub details: ListingDetails,
    /// Timestamp captured when the patch was created.
    pub updated_at: NaiveDateTime,
}

impl UpdateListing {
    pub fn new(details: ListingDetails) -> Self {
        Self {
            details,
            updated_at: Local::now().naive_utc(),
        }
    }
}

/// Everything the update transaction applies to a listing at once.
#[derive(Debug, Clone)]
pub struct ListingChanges {
    pub updates: UpdateListing,
    /// Image ids the user removed; ids of other listings are ignored.
    pub removed_image_ids: Vec<i32>,
    /// Images accepted by the intake pipeline.
    pub new_images: Vec<NewListingImage>,
    /// Existing image that becomes primary.
    pub primary_image_id: Option<i32>,
}

/// Result of a committed update.
#[derive(Debug, Clone)]
pub struct UpdatedListing {
    pub listing: Listing,
    pub images: Vec<ListingImage>,
    /// Storage keys of the deleted image rows; the files still exist.
    pub removed_paths: Vec<String>,
}

/// Listing row for the index page with its lookups resolved.
#[derive(Debug, Serialize, Clone)]
pub struct ListingSummary {
    #[serde(flatten)]
    pub listing: Listing,
    pub category_name: Option<String>,
    pub city_name: Option<String>,
    pub commune_name: Option<String>,
    /// Storage key of the primary image, if the listing has one.
    pub primary_image: Option<String>,
}

/// Per-owner counters shown on the index page.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListingStats {
    pub total: usize,
    pub active: usize,
    pub pending: usize,
    pub promoted: usize,
}

/// Query definition used to list the listings of one owner.
#[derive(Debug, Clone)]
pub struct ListingListQuery {
    pub owner_id: i32,
    pub category_id: Option<i32>,
    /// `Some(true)` for active, `Some(false)` for pending moderation.
    pub active: Option<bool>,
    pub city_id: Option<i32>,
    pub commune_id: Option<i32>,
    /// Free text matched against title and description.
    pub search: Option<String>,
    pub pagination: Option<Pagination>,
}

impl ListingListQuery {
    /// Construct a query that targets all listings belonging to `owner_id`.
    pub fn new(owner_id: i32) -> Self {
        Self {
            owner_id,
            category_id: None,
            active: None,
            city_id: None,
            commune_id: None,
            search: None,
            pagination: None,
        }
    }

    pub fn category(mut self, category_id: i32) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn city(mut self, city_id: i32) -> Self {
        self.city_id = Some(city_id);
        self
    }

    pub fn commune(mut self, commune_id: i32) -> Self {
        self.commune_id = Some(commune_id);
        self
    }

    /// Filter the results by a search term applied to the title or description.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Apply pagination to the query with the given page number and page size.
    pub fn paginate(mut self, page: usize, per_page: usize) -> Self {
        self.pagination = Some(Pagination { page, per_page });
        self
    }
}
