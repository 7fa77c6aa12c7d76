use std::future::{Ready, ready};

use actix_identity::IdentityExt;
use actix_web::dev::Payload;
use actix_web::error::InternalError;
use actix_web::http::header;
use actix_web::{FromRequest, HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};

use crate::models::config::ServerConfig;

/// Request-scoped identity of the logged in panel user.
///
/// The id is stored by the login service in the shared identity cookie.
/// Requests without a usable identity are redirected to the login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: i32,
}

impl AuthenticatedUser {
    pub fn new(id: i32) -> Self {
        Self { id }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req
            .get_identity()
            .ok()
            .and_then(|identity| identity.id().ok())
            .and_then(|id| id.parse::<i32>().ok())
            .map(AuthenticatedUser::new);

        match user {
            Some(user) => ready(Ok(user)),
            None => {
                let login_url = req
                    .app_data::<web::Data<ServerConfig>>()
                    .map(|config| config.login_url())
                    .unwrap_or_else(|| "/login".to_string());
                let response = HttpResponse::SeeOther()
                    .insert_header((header::LOCATION, login_url))
                    .finish();
                ready(Err(
                    InternalError::from_response("not authenticated", response).into()
                ))
            }
        }
    }
}
