pub mod category;
pub mod config;
pub mod listing;
pub mod listing_image;
pub mod location;
