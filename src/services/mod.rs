pub mod errors;
pub mod listings;
pub mod stats;

pub use errors::{ServiceError, ServiceResult};
