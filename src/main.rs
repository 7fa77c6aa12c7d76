use std::env;
use std::path::PathBuf;

use actix_files::Files;
use actix_identity::IdentityMiddleware;
use actix_multipart::form::MultipartFormConfig;
use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::Key;
use actix_web::{App, HttpServer, middleware, web};
use actix_web_flash_messages::{FlashMessagesFramework, storage::CookieMessageStore};
use dotenvy::dotenv;
use tera::Tera;

use anuncios_panel::db::establish_connection_pool;
use anuncios_panel::images::watermark::DEFAULT_WATERMARK_TEXT;
use anuncios_panel::images::{FileStorage, ImageIntake, TextWatermark};
use anuncios_panel::models::config::ServerConfig;
use anuncios_panel::repository::{DieselRepository, MAX_IMAGES_PER_LISTING};
use anuncios_panel::routes::api::api_v1_communes;
use anuncios_panel::routes::listings::{
    create_listing, multipart_error_handler, show_edit_listing, show_index, show_new_listing,
    update_listing,
};
use anuncios_panel::services::stats::DEFAULT_STATS_TTL_SECONDS;

/// Upper bound for a whole multipart request and for the `imagenes[]` field.
const MAX_FORM_SIZE: usize = (MAX_IMAGES_PER_LISTING + 1) * 8 * 1024 * 1024;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    dotenv().ok(); // Load .env file

    let database_url = env::var("DATABASE_URL").unwrap_or("app.db".to_string());
    let port = env::var("PORT").unwrap_or("8080".to_string());
    let port = port.parse::<u16>().unwrap_or(8080);
    let address = env::var("ADDRESS").unwrap_or("127.0.0.1".to_string());

    let secret_key = match env::var("SECRET_KEY") {
        Ok(key) => Key::from(key.as_bytes()),
        Err(_) => Key::generate(),
    };

    let auth_service_url = match env::var("AUTH_SERVICE_URL") {
        Ok(auth_service_url) => auth_service_url,
        Err(_) => {
            log::error!("AUTH_SERVICE_URL environment variable not set");
            std::process::exit(1);
        }
    };

    let watermark_font = match env::var("WATERMARK_FONT") {
        Ok(path) => PathBuf::from(path),
        Err(_) => {
            log::error!("WATERMARK_FONT environment variable not set");
            std::process::exit(1);
        }
    };

    let server_config = ServerConfig {
        auth_service_url,
        upload_dir: PathBuf::from(env::var("UPLOAD_DIR").unwrap_or("uploads".to_string())),
        watermark_text: env::var("WATERMARK_TEXT").unwrap_or(DEFAULT_WATERMARK_TEXT.to_string()),
        watermark_font,
        stats_ttl_seconds: env::var("STATS_TTL_SECONDS")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(DEFAULT_STATS_TTL_SECONDS),
    };

    let domain = env::var("DOMAIN").unwrap_or("localhost".to_string());

    let pool = match establish_connection_pool(&database_url) {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };
    let repo = DieselRepository::new(pool);

    if let Err(e) = std::fs::create_dir_all(&server_config.upload_dir) {
        log::error!(
            "Failed to create upload directory {}: {e}",
            server_config.upload_dir.display()
        );
        std::process::exit(1);
    }

    let watermark = match TextWatermark::from_font_file(
        server_config.watermark_text.clone(),
        &server_config.watermark_font,
    ) {
        Ok(watermark) => watermark,
        Err(e) => {
            log::error!(
                "Failed to load watermark font {}: {e}",
                server_config.watermark_font.display()
            );
            std::process::exit(1);
        }
    };
    let intake = web::Data::new(ImageIntake::new(
        FileStorage::new(server_config.upload_dir.clone()),
        watermark,
    ));

    let message_store = CookieMessageStore::builder(secret_key.clone()).build();
    let message_framework = FlashMessagesFramework::builder(message_store).build();

    let tera = match Tera::new("templates/**/*") {
        Ok(t) => t,
        Err(e) => {
            log::error!("Parsing error(s): {e}");
            std::process::exit(1);
        }
    };

    let upload_dir = server_config.upload_dir.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(message_framework.clone())
            .wrap(IdentityMiddleware::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_secure(false) // set to true in prod
                    .cookie_domain(Some(format!(".{domain}")))
                    .build(),
            )
            .wrap(middleware::Compress::default())
            .wrap(middleware::Logger::default())
            .service(Files::new("/assets", "./assets"))
            .service(Files::new("/uploads", upload_dir.clone()))
            .service(web::scope("/api").service(api_v1_communes))
            .service(show_index)
            .service(show_new_listing)
            .service(create_listing)
            .service(show_edit_listing)
            .service(update_listing)
            .app_data(
                MultipartFormConfig::default()
                    .total_limit(MAX_FORM_SIZE)
                    .error_handler(multipart_error_handler),
            )
            .app_data(web::Data::new(tera.clone()))
            .app_data(web::Data::new(repo.clone()))
            .app_data(web::Data::new(server_config.clone()))
            .app_data(intake.clone())
    })
    .bind((address, port))?
    .run()
    .await
}
