use actix_web::HttpResponse;
use actix_web::http::header;
use actix_web_flash_messages::{IncomingFlashMessages, Level};
use serde::Serialize;
use tera::{Context, Tera};

use crate::domain::auth::AuthenticatedUser;

pub mod api;
pub mod listings;

/// Flash message prepared for the `alerts` block of the base template.
#[derive(Debug, Serialize)]
struct Alert {
    level: &'static str,
    message: String,
}

fn alert_level(level: Level) -> &'static str {
    match level {
        Level::Error => "danger",
        Level::Warning => "warning",
        Level::Success => "success",
        _ => "info",
    }
}

/// Context shared by every page: flash alerts, the user and the active menu entry.
pub fn base_context(
    flash_messages: &IncomingFlashMessages,
    user: &AuthenticatedUser,
    current_page: &str,
    auth_service_url: &str,
) -> Context {
    page_context(
        incoming_alerts(flash_messages),
        user,
        current_page,
        auth_service_url,
    )
}

/// [`base_context`] plus error alerts raised while handling this request.
pub fn context_with_errors(
    flash_messages: &IncomingFlashMessages,
    user: &AuthenticatedUser,
    current_page: &str,
    auth_service_url: &str,
    errors: Vec<String>,
) -> Context {
    let mut alerts = incoming_alerts(flash_messages);
    alerts.extend(error_alerts(errors));
    page_context(alerts, user, current_page, auth_service_url)
}

fn incoming_alerts(flash_messages: &IncomingFlashMessages) -> Vec<Alert> {
    flash_messages
        .iter()
        .map(|message| Alert {
            level: alert_level(message.level()),
            message: message.content().to_string(),
        })
        .collect()
}

fn error_alerts(errors: Vec<String>) -> impl Iterator<Item = Alert> {
    errors.into_iter().map(|message| Alert {
        level: alert_level(Level::Error),
        message,
    })
}

fn page_context(
    alerts: Vec<Alert>,
    user: &AuthenticatedUser,
    current_page: &str,
    auth_service_url: &str,
) -> Context {
    let mut context = Context::new();
    context.insert("alerts", &alerts);
    context.insert("current_user", user);
    context.insert("current_page", current_page);
    context.insert("home_url", auth_service_url);
    context
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

pub fn render_template(tera: &Tera, template: &str, context: &Context) -> HttpResponse {
    match tera.render(template, context) {
        Ok(body) => HttpResponse::Ok().content_type("text/html").body(body),
        Err(err) => {
            log::error!("Failed to render template '{template}': {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;

    use super::*;

    #[test]
    fn redirect_sets_location() {
        let response = redirect("/anuncios/publicar");

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok()),
            Some("/anuncios/publicar")
        );
    }

    #[test]
    fn error_alerts_render_as_danger() {
        let alerts: Vec<Alert> =
            error_alerts(vec!["El título es obligatorio".to_string()]).collect();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, "danger");
        assert_eq!(alerts[0].message, "El título es obligatorio");
    }

    #[test]
    fn render_template_reports_missing_template() {
        let tera = Tera::default();

        let response = render_template(&tera, "missing.html", &Context::new());

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn render_template_renders_body() {
        let mut tera = Tera::default();
        tera.add_raw_template("hello.html", "Hola {{ name }}")
            .expect("valid template");
        let mut context = Context::new();
        context.insert("name", "mundo");

        let response = render_template(&tera, "hello.html", &context);

        assert_eq!(response.status(), StatusCode::OK);
    }
}
