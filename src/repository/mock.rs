use mockall::mock;

use super::{CategoryReader, ListingReader, ListingWriter, LocationReader};
use crate::domain::{
    category::Category,
    listing::{
        Listing, ListingChanges, ListingListQuery, ListingStats, ListingSummary, NewListing,
        UpdatedListing,
    },
    listing_image::{ListingImage, NewListingImage},
    location::{City, Commune},
};
use crate::repository::RepositoryResult;

mock! {
    pub CategoryReader {}

    impl CategoryReader for CategoryReader {
        fn list_categories(&self) -> RepositoryResult<Vec<Category>>;
        fn get_category_by_id(&self, id: i32) -> RepositoryResult<Option<Category>>;
    }
}

mock! {
    pub LocationReader {}

    impl LocationReader for LocationReader {
        fn list_cities(&self) -> RepositoryResult<Vec<City>>;
        fn get_city_by_id(&self, id: i32) -> RepositoryResult<Option<City>>;
        fn list_communes(&self, city_id: i32) -> RepositoryResult<Vec<Commune>>;
        fn get_commune_by_id(&self, id: i32) -> RepositoryResult<Option<Commune>>;
    }
}

mock! {
    pub ListingReader {}

    impl ListingReader for ListingReader {
        fn get_listing_by_id(&self, id: i32, owner_id: i32) -> RepositoryResult<Option<Listing>>;
        fn list_listings(&self, query: ListingListQuery) -> RepositoryResult<(usize, Vec<ListingSummary>)>;
        fn list_listing_images(&self, listing_id: i32) -> RepositoryResult<Vec<ListingImage>>;
        fn listing_stats(&self, owner_id: i32) -> RepositoryResult<ListingStats>;
    }
}

mock! {
    pub ListingWriter {}

    impl ListingWriter for ListingWriter {
        fn create_listing(&self, new_listing: &NewListing, images: &[NewListingImage]) -> RepositoryResult<Listing>;
        fn update_listing(&self, listing_id: i32, owner_id: i32, changes: &ListingChanges) -> RepositoryResult<UpdatedListing>;
    }
}
