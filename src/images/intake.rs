use std::collections::HashSet;

use md5::{Digest, Md5};
use serde::Serialize;
use thiserror::Error;

use crate::domain::listing_image::NewListingImage;
use crate::images::storage::FileStorage;
use crate::images::watermark::Watermark;
use crate::repository::MAX_IMAGES_PER_LISTING;

/// Largest accepted upload, in bytes.
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

/// MIME types accepted for listing images.
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

/// File received from the multipart form, already read into memory.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    /// MIME type declared by the client.
    pub content_type: Option<String>,
    /// Size declared by the client.
    pub size: usize,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("imagen")
    }
}

#[derive(Debug, Clone)]
pub struct IntakePolicy {
    pub max_file_size: usize,
    pub allowed_types: Vec<String>,
    pub max_images: usize,
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self {
            max_file_size: MAX_IMAGE_SIZE,
            allowed_types: ALLOWED_IMAGE_TYPES.iter().map(|t| t.to_string()).collect(),
            max_images: MAX_IMAGES_PER_LISTING,
        }
    }
}

/// Why a single upload was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum RejectionReason {
    #[error("el archivo es demasiado grande (máximo 5MB)")]
    TooLarge,
    #[error("tipo de archivo no permitido, solo se aceptan JPG, PNG y GIF")]
    UnsupportedType,
    #[error("se alcanzó el máximo de {0} imágenes por anuncio")]
    LimitReached(usize),
    #[error("la imagen ya fue subida")]
    Duplicate,
    #[error("no se pudo guardar la imagen")]
    Storage,
    #[error("la imagen está dañada o no se pudo procesar")]
    Corrupted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedImage {
    pub file_name: String,
    pub reason: RejectionReason,
}

impl std::fmt::Display for RejectedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file_name, self.reason)
    }
}

/// Images accepted and stored, plus the ones that were skipped.
#[derive(Debug, Default)]
pub struct IntakeOutcome {
    pub accepted: Vec<NewListingImage>,
    pub rejected: Vec<RejectedImage>,
}

/// Images already attached to the listing being edited.
#[derive(Debug, Default, Clone)]
pub struct ExistingImages {
    /// Hashes of the images the listing keeps after this request.
    pub hashes: HashSet<String>,
    pub count: usize,
}

impl ExistingImages {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(hashes: impl IntoIterator<Item = String>) -> Self {
        let hashes: HashSet<String> = hashes.into_iter().collect();
        let count = hashes.len();
        Self { hashes, count }
    }
}

/// Validates, deduplicates, stores and watermarks uploaded listing images.
///
/// A rejected upload never aborts the batch: it is reported in
/// [`IntakeOutcome::rejected`] and processing continues with the next file.
pub struct ImageIntake<W> {
    storage: FileStorage,
    watermark: W,
    policy: IntakePolicy,
}

impl<W: Watermark> ImageIntake<W> {
    pub fn new(storage: FileStorage, watermark: W) -> Self {
        Self::with_policy(storage, watermark, IntakePolicy::default())
    }

    pub fn with_policy(storage: FileStorage, watermark: W, policy: IntakePolicy) -> Self {
        Self {
            storage,
            watermark,
            policy,
        }
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    /// Run every upload through the intake rules in upload order.
    pub fn process(&self, uploads: Vec<UploadedImage>, existing: &ExistingImages) -> IntakeOutcome {
        let mut outcome = IntakeOutcome::default();
        let mut seen_hashes: HashSet<String> = HashSet::new();

        for upload in uploads {
            match self.accept(&upload, existing, &outcome.accepted, &seen_hashes) {
                Ok(image) => {
                    seen_hashes.insert(image.hash.clone());
                    outcome.accepted.push(image);
                }
                Err(reason) => {
                    log::warn!("Skipping upload `{}`: {reason}", upload.display_name());
                    outcome.rejected.push(RejectedImage {
                        file_name: upload.display_name().to_string(),
                        reason,
                    });
                }
            }
        }

        outcome
    }

    /// Delete the stored files of images that will not be persisted.
    pub fn discard(&self, images: &[NewListingImage]) {
        for image in images {
            if let Err(err) = self.storage.remove(&image.path) {
                log::warn!("Failed to remove stored image {}: {err}", image.path);
            }
        }
    }

    fn accept(
        &self,
        upload: &UploadedImage,
        existing: &ExistingImages,
        accepted: &[NewListingImage],
        seen_hashes: &HashSet<String>,
    ) -> Result<NewListingImage, RejectionReason> {
        if upload.size > self.policy.max_file_size {
            return Err(RejectionReason::TooLarge);
        }

        let allowed = upload
            .content_type
            .as_deref()
            .is_some_and(|declared| self.policy.allowed_types.iter().any(|t| t == declared));
        if !allowed {
            return Err(RejectionReason::UnsupportedType);
        }

        if existing.count + accepted.len() >= self.policy.max_images {
            return Err(RejectionReason::LimitReached(self.policy.max_images));
        }

        let hash = content_hash(&upload.bytes);
        if seen_hashes.contains(&hash) || existing.hashes.contains(&hash) {
            return Err(RejectionReason::Duplicate);
        }

        let key = self
            .storage
            .store(upload.file_name.as_deref(), &upload.bytes)
            .map_err(|err| {
                log::error!("Failed to store upload `{}`: {err}", upload.display_name());
                RejectionReason::Storage
            })?;

        if let Err(err) = self.watermark.apply(&self.storage.path_of(&key)) {
            log::warn!("Failed to watermark `{}`: {err}", upload.display_name());
            if let Err(remove_err) = self.storage.remove(&key) {
                log::warn!("Failed to remove unwatermarked image {key}: {remove_err}");
            }
            return Err(RejectionReason::Corrupted);
        }

        let is_primary = existing.count == 0 && accepted.is_empty();
        Ok(NewListingImage::new(key, hash, is_primary))
    }
}

/// Lower-case hex MD5 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Md5::digest(bytes))
}
