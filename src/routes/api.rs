use actix_web::{HttpResponse, Responder, get, web};
use serde::Deserialize;

use crate::domain::auth::AuthenticatedUser;
use crate::forms::lenient_number;
use crate::repository::DieselRepository;
use crate::services::listings;

#[derive(Debug, Deserialize)]
pub struct CommunesQuery {
    #[serde(default, deserialize_with = "lenient_number")]
    pub ciudad_id: Option<i32>,
}

#[get("/v1/comunas")]
/// Return the communes of `ciudad_id` as `[{id, nombre}]`.
///
/// A missing or invalid city id yields an empty list.
pub async fn api_v1_communes(
    params: web::Query<CommunesQuery>,
    _user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    communes_response(repo.get_ref(), params.ciudad_id.unwrap_or_default())
}

/// JSON commune lookup shared with the publish and edit pages.
pub fn communes_response(repo: &DieselRepository, city_id: i32) -> HttpResponse {
    match listings::list_communes(repo, city_id) {
        Ok(communes) => HttpResponse::Ok().json(communes),
        Err(err) => {
            log::error!("Failed to list communes of city {city_id}: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
