use std::path::PathBuf;

/// Settings shared with every handler through `web::Data`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Login page of the external auth service.
    pub auth_service_url: String,
    /// Directory holding the watermarked listing images.
    pub upload_dir: PathBuf,
    /// Text burned into every uploaded image.
    pub watermark_text: String,
    /// TrueType font used to draw the watermark.
    pub watermark_font: PathBuf,
    /// Lifetime of the per-user statistics memo kept in the session.
    pub stats_ttl_seconds: i64,
}

impl ServerConfig {
    /// URL unauthenticated requests are sent to.
    pub fn login_url(&self) -> String {
        self.auth_service_url.clone()
    }
}
