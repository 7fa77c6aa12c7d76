//! Intake pipeline for listing images: validation, MD5 deduplication,
//! storage in the upload directory and watermarking.

pub mod intake;
pub mod storage;
pub mod watermark;

pub use intake::{
    ExistingImages, ImageIntake, IntakeOutcome, IntakePolicy, RejectedImage, RejectionReason,
    UploadedImage,
};
pub use storage::FileStorage;
pub use watermark::{TextWatermark, Watermark, WatermarkError};
