use crate::db::{DbConnection, DbPool};
use crate::domain::category::Category;
use crate::domain::listing::{
    Listing, ListingChanges, ListingListQuery, ListingStats, ListingSummary, NewListing,
    UpdatedListing,
};
use crate::domain::listing_image::{ListingImage, NewListingImage};
use crate::domain::location::{City, Commune};

pub mod category;
pub mod errors;
pub mod listing;
pub mod location;

#[cfg(test)]
pub mod mock;

pub use errors::{RepositoryError, RepositoryResult};

/// Hard cap on images attached to one listing.
pub const MAX_IMAGES_PER_LISTING: usize = 8;

#[derive(Clone)]
/// Diesel-backed repository implementation that wraps an r2d2 pool.
pub struct DieselRepository {
    pool: DbPool, // r2d2::Pool is cheap to clone
}

impl DieselRepository {
    /// Create a new repository using the provided connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> RepositoryResult<DbConnection> {
        Ok(self.pool.get()?)
    }
}

/// Read-only access to the category reference table.
pub trait CategoryReader {
    fn list_categories(&self) -> RepositoryResult<Vec<Category>>;
    fn get_category_by_id(&self, id: i32) -> RepositoryResult<Option<Category>>;
}

/// Read-only access to cities and their communes.
pub trait LocationReader {
    fn list_cities(&self) -> RepositoryResult<Vec<City>>;
    fn get_city_by_id(&self, id: i32) -> RepositoryResult<Option<City>>;
    fn list_communes(&self, city_id: i32) -> RepositoryResult<Vec<Commune>>;
    fn get_commune_by_id(&self, id: i32) -> RepositoryResult<Option<Commune>>;
}

/// Read-only operations over listing records.
pub trait ListingReader {
    /// Listing `id` if it belongs to `owner_id`.
    fn get_listing_by_id(&self, id: i32, owner_id: i32) -> RepositoryResult<Option<Listing>>;
    fn list_listings(
        &self,
        query: ListingListQuery,
    ) -> RepositoryResult<(usize, Vec<ListingSummary>)>;
    /// Images of a listing, oldest first.
    fn list_listing_images(&self, listing_id: i32) -> RepositoryResult<Vec<ListingImage>>;
    fn listing_stats(&self, owner_id: i32) -> RepositoryResult<ListingStats>;
}

/// Transactional write operations over listings and their images.
pub trait ListingWriter {
    fn create_listing(
        &self,
        new_listing: &NewListing,
        images: &[NewListingImage],
    ) -> RepositoryResult<Listing>;
    fn update_listing(
        &self,
        listing_id: i32,
        owner_id: i32,
        changes: &ListingChanges,
    ) -> RepositoryResult<UpdatedListing>;
}
