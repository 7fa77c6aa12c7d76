pub mod auth;
pub mod category;
pub mod listing;
pub mod listing_image;
pub mod location;
