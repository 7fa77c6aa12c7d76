use actix_multipart::MultipartError;
use actix_multipart::form::MultipartForm;
use actix_session::Session;
use actix_web::error::InternalError;
use actix_web::{HttpRequest, HttpResponse, Responder, get, post, web};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use chrono::Utc;
use serde::Deserialize;
use tera::{Context, Tera};

use crate::domain::auth::AuthenticatedUser;
use crate::forms::lenient_number;
use crate::forms::listings::{ListingFields, ListingMultipartForm};
use crate::images::{ImageIntake, TextWatermark};
use crate::models::config::ServerConfig;
use crate::repository::{DieselRepository, MAX_IMAGES_PER_LISTING};
use crate::routes::api::communes_response;
use crate::routes::{base_context, context_with_errors, redirect, render_template};
use crate::services::listings::{self, ListingFormData, SavedListing};
use crate::services::stats::{STATS_SESSION_KEY, StatsMemo, resolve_stats};
use crate::services::{ServiceError, ServiceResult};

const NEW_LISTING_URL: &str = "/anuncios/publicar";
const NOT_FOUND_MESSAGE: &str = "Anuncio no encontrado o no tienes permiso para editarlo";
const MISSING_ID_MESSAGE: &str = "ID de anuncio no proporcionado";
const UNREADABLE_FORM_MESSAGE: &str =
    "No se pudo leer el formulario, revisa que las imágenes no superen el tamaño permitido";

/// Query of the publish and edit pages.
#[derive(Debug, Default, Deserialize)]
pub struct ListingPageQuery {
    #[serde(default, deserialize_with = "lenient_number")]
    pub id: Option<i32>,
    /// Present when the page asks for the communes of a city.
    #[serde(default, deserialize_with = "lenient_number")]
    pub ciudad_id: Option<i32>,
}

fn edit_url(listing_id: i32) -> String {
    format!("/anuncios/modificar?id={listing_id}")
}

fn cached_stats(
    session: &Session,
    repo: &DieselRepository,
    user: &AuthenticatedUser,
    ttl_seconds: i64,
) -> ServiceResult<StatsMemo> {
    let cached = session
        .get::<StatsMemo>(STATS_SESSION_KEY)
        .unwrap_or_else(|err| {
            log::warn!("Ignoring unreadable stats memo: {err}");
            None
        });

    let memo = resolve_stats(repo, user.id, cached, Utc::now().timestamp(), ttl_seconds)?;
    if cached != Some(memo) {
        if let Err(err) = session.insert(STATS_SESSION_KEY, memo) {
            log::warn!("Failed to store stats memo: {err}");
        }
    }
    Ok(memo)
}

fn render_form(
    tera: &Tera,
    mut context: Context,
    data: ListingFormData,
    action: &str,
) -> HttpResponse {
    context.insert("listing", &data.listing);
    context.insert("values", &data.values);
    context.insert("images", &data.images);
    context.insert("categories", &data.categories);
    context.insert("cities", &data.cities);
    context.insert("communes", &data.communes);
    context.insert("max_images", &MAX_IMAGES_PER_LISTING);
    context.insert("form_action", action);
    render_template(tera, "listings/form.html", &context)
}

/// Shows the form again with the submitted values and the validation errors.
fn render_invalid_form(
    tera: &Tera,
    context: Context,
    repo: &DieselRepository,
    user: &AuthenticatedUser,
    listing_id: Option<i32>,
    fields: ListingFields,
) -> HttpResponse {
    let loaded = match listing_id {
        Some(id) => listings::load_edit_listing_form(repo, user, id),
        None => listings::load_new_listing_form(repo),
    };
    let refilled = loaded.and_then(|mut data| {
        listings::refill_listing_form(repo, &mut data, fields)?;
        Ok(data)
    });

    match (refilled, listing_id) {
        (Ok(data), Some(id)) => render_form(tera, context, data, &edit_url(id)),
        (Ok(data), None) => render_form(tera, context, data, NEW_LISTING_URL),
        (Err(err), Some(id)) => report_failure(err, &edit_url(id), "reload listing form"),
        (Err(err), None) => report_failure(err, NEW_LISTING_URL, "reload listing form"),
    }
}

fn report_saved(session: &Session, saved: &SavedListing, message: &str) {
    session.remove(STATS_SESSION_KEY);
    FlashMessage::success(message).send();
    for rejected in &saved.rejected {
        FlashMessage::warning(format!("Imagen omitida: {rejected}")).send();
    }
}

fn report_failure(err: ServiceError, back_to: &str, action: &str) -> HttpResponse {
    match err {
        ServiceError::NotFound => {
            FlashMessage::error(NOT_FOUND_MESSAGE).send();
            redirect("/")
        }
        ServiceError::Validation(errors) => {
            for error in errors {
                FlashMessage::error(error).send();
            }
            redirect(back_to)
        }
        ServiceError::Form(message) => {
            FlashMessage::error(message).send();
            redirect(back_to)
        }
        err => {
            log::error!("Failed to {action}: {err}");
            FlashMessage::error("No se pudo guardar el anuncio, inténtalo nuevamente").send();
            redirect(back_to)
        }
    }
}

/// Sends the user back to the form when the multipart body cannot be read.
pub fn multipart_error_handler(err: MultipartError, req: &HttpRequest) -> actix_web::Error {
    log::warn!("Rejected listing form on {}: {err}", req.path());
    FlashMessage::error(UNREADABLE_FORM_MESSAGE).send();
    InternalError::from_response(err, redirect(&back_to_form(req))).into()
}

fn back_to_form(req: &HttpRequest) -> String {
    req.uri()
        .path_and_query()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| NEW_LISTING_URL.to_string())
}

#[get("/")]
pub async fn show_index(
    params: web::Query<listings::ListingsQuery>,
    user: AuthenticatedUser,
    session: Session,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let data = match listings::load_listings_page(repo.get_ref(), &user, params.into_inner()) {
        Ok(data) => data,
        Err(err) => {
            log::error!("Failed to list listings: {err}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let stats = match cached_stats(
        &session,
        repo.get_ref(),
        &user,
        server_config.stats_ttl_seconds,
    ) {
        Ok(memo) => memo.stats,
        Err(err) => {
            log::error!("Failed to compute listing stats: {err}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let mut context = base_context(
        &flash_messages,
        &user,
        "index",
        &server_config.auth_service_url,
    );
    context.insert("listings", &data.listings);
    context.insert("filters", &data.filters);
    context.insert("has_active_filters", &data.filters.is_active());
    context.insert("categories", &data.categories);
    context.insert("cities", &data.cities);
    context.insert("communes", &data.communes);
    context.insert("stats", &stats);
    render_template(&tera, "listings/index.html", &context)
}

#[get("/anuncios/publicar")]
pub async fn show_new_listing(
    params: web::Query<ListingPageQuery>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    if let Some(city_id) = params.ciudad_id {
        return communes_response(repo.get_ref(), city_id);
    }

    match listings::load_new_listing_form(repo.get_ref()) {
        Ok(data) => {
            let context = base_context(
                &flash_messages,
                &user,
                "publicar",
                &server_config.auth_service_url,
            );
            render_form(&tera, context, data, NEW_LISTING_URL)
        }
        Err(err) => {
            log::error!("Failed to load the publish form: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[post("/anuncios/publicar")]
#[allow(clippy::too_many_arguments)]
pub async fn create_listing(
    user: AuthenticatedUser,
    session: Session,
    repo: web::Data<DieselRepository>,
    intake: web::Data<ImageIntake<TextWatermark>>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
    MultipartForm(form): MultipartForm<ListingMultipartForm>,
) -> impl Responder {
    let submission = match form.into_submission() {
        Ok(submission) => submission,
        Err(err) => {
            return report_failure(
                ServiceError::Form(err.to_string()),
                NEW_LISTING_URL,
                "read listing form",
            );
        }
    };
    let submitted = submission.fields.clone();

    match listings::create_listing(repo.get_ref(), intake.get_ref(), &user, submission) {
        Ok(saved) => {
            report_saved(
                &session,
                &saved,
                "Anuncio publicado. Quedará visible cuando sea aprobado.",
            );
            redirect("/")
        }
        Err(ServiceError::Validation(errors)) => {
            let context = context_with_errors(
                &flash_messages,
                &user,
                "publicar",
                &server_config.auth_service_url,
                errors,
            );
            render_invalid_form(&tera, context, repo.get_ref(), &user, None, submitted)
        }
        Err(err) => report_failure(err, NEW_LISTING_URL, "create listing"),
    }
}

#[get("/anuncios/modificar")]
pub async fn show_edit_listing(
    params: web::Query<ListingPageQuery>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let listing_id = match (params.id, params.ciudad_id) {
        (Some(id), _) if id > 0 => id,
        (None, Some(city_id)) => return communes_response(repo.get_ref(), city_id),
        _ => return HttpResponse::BadRequest().body(MISSING_ID_MESSAGE),
    };

    match listings::load_edit_listing_form(repo.get_ref(), &user, listing_id) {
        Ok(data) => {
            let context = base_context(
                &flash_messages,
                &user,
                "modificar",
                &server_config.auth_service_url,
            );
            render_form(&tera, context, data, &edit_url(listing_id))
        }
        Err(ServiceError::NotFound) => {
            FlashMessage::error(NOT_FOUND_MESSAGE).send();
            redirect("/")
        }
        Err(err) => {
            log::error!("Failed to load listing {listing_id}: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[post("/anuncios/modificar")]
#[allow(clippy::too_many_arguments)]
pub async fn update_listing(
    params: web::Query<ListingPageQuery>,
    user: AuthenticatedUser,
    session: Session,
    repo: web::Data<DieselRepository>,
    intake: web::Data<ImageIntake<TextWatermark>>,
    flash_messages: IncomingFlashMessages,
    server_config: web::Data<ServerConfig>,
    tera: web::Data<Tera>,
    MultipartForm(form): MultipartForm<ListingMultipartForm>,
) -> impl Responder {
    let Some(listing_id) = params.id.filter(|id| *id > 0) else {
        return HttpResponse::BadRequest().body(MISSING_ID_MESSAGE);
    };
    let back_to = edit_url(listing_id);

    let submission = match form.into_submission() {
        Ok(submission) => submission,
        Err(err) => {
            return report_failure(
                ServiceError::Form(err.to_string()),
                &back_to,
                "read listing form",
            );
        }
    };
    let submitted = submission.fields.clone();

    match listings::update_listing(repo.get_ref(), intake.get_ref(), &user, listing_id, submission)
    {
        Ok(saved) => {
            report_saved(&session, &saved, "Anuncio actualizado correctamente.");
            redirect("/")
        }
        Err(ServiceError::Validation(errors)) => {
            let context = context_with_errors(
                &flash_messages,
                &user,
                "modificar",
                &server_config.auth_service_url,
                errors,
            );
            render_invalid_form(
                &tera,
                context,
                repo.get_ref(),
                &user,
                Some(listing_id),
                submitted,
            )
        }
        Err(err) => report_failure(err, &back_to, "update listing"),
    }
}
