//! Helpers for integration tests.

use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use anuncios_panel::db::{DbPool, establish_connection_pool};
use anuncios_panel::domain::listing::ListingDetails;
use anuncios_panel::domain::listing_image::NewListingImage;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!(); // assumes migrations/ exists

/// Temporary database used in integration tests.
pub struct TestDb {
    filename: String,
    pool: DbPool,
}

impl TestDb {
    pub fn new(filename: &str) -> Self {
        std::fs::remove_file(filename).ok(); // Clean up old DB

        let pool =
            establish_connection_pool(filename).expect("Failed to establish SQLite connection.");
        let mut conn = pool
            .get()
            .expect("Failed to get SQLite connection from pool.");
        conn.run_pending_migrations(MIGRATIONS)
            .expect("Migrations failed");
        TestDb {
            filename: filename.to_string(),
            pool,
        }
    }
    pub fn pool(&self) -> DbPool {
        self.pool.clone()
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        std::fs::remove_file(&self.filename).ok();
        std::fs::remove_file(format!("{}-shm", &self.filename)).ok();
        std::fs::remove_file(format!("{}-wal", &self.filename)).ok();
    }
}

/// Valid details for a listing in Providencia, Santiago.
#[allow(dead_code)]
pub fn sample_details(title: &str) -> ListingDetails {
    ListingDetails {
        category_id: 1,
        city_id: 1,
        commune_id: 1,
        age: 28,
        title: title.to_string(),
        description: "Sesiones de masaje relajante con aceites esenciales en un ambiente \
                      tranquilo. Atiendo de lunes a sábado con reserva previa por teléfono o \
                      por correo electrónico."
            .to_string(),
        phone: "+56 9 1234 5678".to_string(),
        whatsapp: true,
        email: "contacto@example.cl".to_string(),
    }
}

#[allow(dead_code)]
pub fn sample_image(tag: &str) -> NewListingImage {
    NewListingImage::new(format!("{tag}.jpg"), format!("hash-{tag}"), false)
}
