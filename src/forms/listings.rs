use std::fs;

use actix_multipart::form::{MultipartForm, tempfile::TempFile, text::Text};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::domain::listing::{Listing, ListingDetails};
use crate::images::UploadedImage;

const TITLE_MIN_LEN: u64 = 40;
const TITLE_MAX_LEN: u64 = 70;
const DESCRIPTION_MIN_LEN: u64 = 150;
const DESCRIPTION_MAX_LEN: u64 = 2000;
const MIN_AGE: i32 = 18;
const MAX_AGE: i32 = 99;

/// Field order used when reporting validation errors.
const FIELD_ORDER: [&str; 9] = [
    "categoria_id",
    "ciudad_id",
    "comuna_id",
    "edad",
    "titulo",
    "descripcion",
    "telefono",
    "whatsapp",
    "correo",
];

lazy_static! {
    static ref TITLE_CHARSET: Regex =
        Regex::new(r#"^[A-Za-z0-9ÁÉÍÓÚÜÑáéíóúüñ .,;:!¡?¿()'"\-]+$"#).unwrap();
    static ref CHILEAN_PHONE: Regex =
        Regex::new(r"^\+56 (9 \d{4} \d{4}|2 \d{3} \d{4})$").unwrap();
    static ref COMPACT_MOBILE: Regex = Regex::new(r"^\+569(\d{4})(\d{4})$").unwrap();
    static ref COMPACT_LANDLINE: Regex = Regex::new(r"^\+562(\d{3})(\d{4})$").unwrap();
}

/// Result type returned by the listing form helpers.
pub type ListingFormResult<T> = Result<T, ListingFormError>;

/// Errors raised while turning the multipart payload into a submission.
#[derive(Debug, Error)]
pub enum ListingFormError {
    #[error("no se pudo leer la imagen subida: {0}")]
    UnreadableUpload(#[from] std::io::Error),
    #[error("la lista de imágenes eliminadas no es válida")]
    InvalidRemovedImages,
    #[error("la imagen principal `{0}` no es válida")]
    InvalidPrimaryImage(String),
}

/// Validation failure attached to one form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Order errors by their position in the form and drop repeated messages.
pub fn error_messages(mut errors: Vec<FieldError>) -> Vec<String> {
    errors.sort_by_key(|error| {
        FIELD_ORDER
            .iter()
            .position(|field| *field == error.field)
            .unwrap_or(FIELD_ORDER.len())
    });

    let mut messages: Vec<String> = Vec::with_capacity(errors.len());
    for error in errors {
        if !messages.contains(&error.message) {
            messages.push(error.message);
        }
    }
    messages
}

/// Scalar listing fields as submitted by the publish and edit forms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ListingFields {
    #[validate(range(min = 1, message = "Selecciona una categoría"))]
    pub categoria_id: i32,
    #[validate(range(min = 1, message = "Selecciona una ciudad"))]
    pub ciudad_id: i32,
    #[validate(range(min = 1, message = "Selecciona una comuna"))]
    pub comuna_id: i32,
    #[validate(range(
        min = MIN_AGE,
        max = MAX_AGE,
        message = "La edad debe estar entre 18 y 99 años"
    ))]
    pub edad: i32,
    #[validate(
        length(
            min = TITLE_MIN_LEN,
            max = TITLE_MAX_LEN,
            message = "El título debe tener entre 40 y 70 caracteres"
        ),
        regex(
            path = *TITLE_CHARSET,
            message = "El título solo puede contener letras, números y puntuación básica"
        )
    )]
    pub titulo: String,
    #[validate(length(
        min = DESCRIPTION_MIN_LEN,
        max = DESCRIPTION_MAX_LEN,
        message = "La descripción debe tener entre 150 y 2000 caracteres"
    ))]
    pub descripcion: String,
    #[validate(regex(
        path = *CHILEAN_PHONE,
        message = "El teléfono debe tener el formato +56 9 XXXX XXXX o +56 2 XXX XXXX"
    ))]
    pub telefono: String,
    #[serde(default)]
    pub whatsapp: bool,
    #[validate(email(message = "Correo electrónico inválido"))]
    pub correo: String,
}

impl ListingFields {
    /// Normalize whitespace, the phone layout and the email case.
    pub fn sanitized(self) -> Self {
        Self {
            titulo: sanitize_inline_text(&self.titulo),
            descripcion: sanitize_multiline_text(&self.descripcion),
            telefono: normalize_phone(&self.telefono),
            correo: self.correo.trim().to_lowercase(),
            ..self
        }
    }

    /// Every syntactic problem with the fields, tagged with the field name.
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => flatten_errors(&errors),
        }
    }

    /// Messages of [`Self::field_errors`] in form order.
    pub fn validation_errors(&self) -> Vec<String> {
        error_messages(self.field_errors())
    }

    pub fn into_details(self) -> ListingDetails {
        ListingDetails {
            category_id: self.categoria_id,
            city_id: self.ciudad_id,
            commune_id: self.comuna_id,
            age: self.edad,
            title: self.titulo,
            description: self.descripcion,
            phone: self.telefono,
            whatsapp: self.whatsapp,
            email: self.correo,
        }
    }
}

impl From<&Listing> for ListingFields {
    fn from(listing: &Listing) -> Self {
        Self {
            categoria_id: listing.category_id,
            ciudad_id: listing.city_id,
            comuna_id: listing.commune_id,
            edad: listing.age,
            titulo: listing.title.clone(),
            descripcion: listing.description.clone(),
            telefono: listing.phone.clone(),
            whatsapp: listing.whatsapp,
            correo: listing.email.clone(),
        }
    }
}

/// Multipart payload posted by the publish and edit pages.
#[derive(MultipartForm)]
pub struct ListingMultipartForm {
    pub categoria_id: Option<Text<String>>,
    pub ciudad_id: Option<Text<String>>,
    pub comuna_id: Option<Text<String>>,
    pub edad: Option<Text<String>>,
    pub titulo: Option<Text<String>>,
    pub descripcion: Option<Text<String>>,
    pub telefono: Option<Text<String>>,
    /// Checkbox; present means checked.
    pub whatsapp: Option<Text<String>>,
    pub correo: Option<Text<String>>,
    /// Same bound as the whole request, so oversize files reach intake and
    /// are skipped there instead of failing the form.
    #[multipart(rename = "imagenes[]", limit = "72MiB")]
    pub imagenes: Vec<TempFile>,
    /// JSON array of image ids removed on the edit page.
    pub imagenes_eliminadas: Option<Text<String>>,
    pub imagen_principal: Option<Text<String>>,
}

/// Parsed submission handed to the listing services.
#[derive(Debug, Clone)]
pub struct ListingSubmission {
    pub fields: ListingFields,
    pub uploads: Vec<UploadedImage>,
    pub removed_image_ids: Vec<i32>,
    pub primary_image_id: Option<i32>,
}

impl ListingSubmission {
    pub fn new(fields: ListingFields) -> Self {
        Self {
            fields,
            uploads: Vec::new(),
            removed_image_ids: Vec::new(),
            primary_image_id: None,
        }
    }
}

impl ListingMultipartForm {
    /// Read uploaded files and parse the auxiliary fields.
    ///
    /// Numeric fields that do not parse become `0` and fail validation later.
    pub fn into_submission(self) -> ListingFormResult<ListingSubmission> {
        let fields = ListingFields {
            categoria_id: parse_id(self.categoria_id.as_ref()),
            ciudad_id: parse_id(self.ciudad_id.as_ref()),
            comuna_id: parse_id(self.comuna_id.as_ref()),
            edad: parse_id(self.edad.as_ref()),
            titulo: text_value(self.titulo.as_ref()),
            descripcion: text_value(self.descripcion.as_ref()),
            telefono: text_value(self.telefono.as_ref()),
            whatsapp: self.whatsapp.is_some(),
            correo: text_value(self.correo.as_ref()),
        };

        let mut uploads = Vec::with_capacity(self.imagenes.len());
        for file in self.imagenes {
            let has_name = file
                .file_name
                .as_deref()
                .is_some_and(|name| !name.trim().is_empty());
            if file.size == 0 && !has_name {
                continue;
            }

            let bytes = fs::read(file.file.path())?;
            uploads.push(UploadedImage {
                file_name: file.file_name.clone(),
                content_type: file
                    .content_type
                    .as_ref()
                    .map(|mime| mime.essence_str().to_string()),
                size: file.size,
                bytes,
            });
        }

        let removed_image_ids = parse_removed_ids(self.imagenes_eliminadas.as_ref())?;
        let primary_image_id = parse_primary_id(self.imagen_principal.as_ref())?;

        Ok(ListingSubmission {
            fields,
            uploads,
            removed_image_ids,
            primary_image_id,
        })
    }
}

fn text_value(field: Option<&Text<String>>) -> String {
    field.map(|text| text.0.clone()).unwrap_or_default()
}

fn parse_id(field: Option<&Text<String>>) -> i32 {
    field
        .and_then(|text| text.0.trim().parse::<i32>().ok())
        .unwrap_or_default()
}

fn parse_removed_ids(field: Option<&Text<String>>) -> ListingFormResult<Vec<i32>> {
    let raw = match field.map(|text| text.0.trim()) {
        None | Some("") => return Ok(Vec::new()),
        Some(raw) => raw,
    };

    let mut ids: Vec<i32> =
        serde_json::from_str(raw).map_err(|_| ListingFormError::InvalidRemovedImages)?;
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

fn parse_primary_id(field: Option<&Text<String>>) -> ListingFormResult<Option<i32>> {
    let raw = match field.map(|text| text.0.trim()) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };

    match raw.parse::<i32>() {
        Ok(id) if id > 0 => Ok(Some(id)),
        Ok(_) => Ok(None),
        Err(_) => Err(ListingFormError::InvalidPrimaryImage(raw.to_string())),
    }
}

fn flatten_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let field_errors = errors.field_errors();
    let mut flattened = Vec::new();

    for field in FIELD_ORDER {
        let Some(errors) = field_errors.get(field) else {
            continue;
        };
        for error in errors.iter() {
            let message = error
                .message
                .as_ref()
                .map(|message| message.to_string())
                .unwrap_or_else(|| format!("El campo {field} no es válido"));
            flattened.push(FieldError::new(field, message));
        }
    }

    flattened
}

/// Rewrite compact Chilean numbers (`+56912345678`) into the spaced layout.
fn normalize_phone(input: &str) -> String {
    let compact: String = input.chars().filter(|ch| !ch.is_whitespace()).collect();

    if let Some(caps) = COMPACT_MOBILE.captures(&compact) {
        return format!("+56 9 {} {}", &caps[1], &caps[2]);
    }
    if let Some(caps) = COMPACT_LANDLINE.captures(&compact) {
        return format!("+56 2 {} {}", &caps[1], &caps[2]);
    }

    input.trim().to_string()
}

fn sanitize_inline_text(input: &str) -> String {
    let mut sanitized = String::with_capacity(input.len());
    let mut previous_whitespace = false;

    for ch in input.trim().chars() {
        if ch.is_whitespace() {
            if !previous_whitespace {
                sanitized.push(' ');
                previous_whitespace = true;
            }
        } else if ch.is_control() {
            continue;
        } else {
            sanitized.push(ch);
            previous_whitespace = false;
        }
    }

    sanitized
}

fn sanitize_multiline_text(input: &str) -> String {
    let mut lines: Vec<String> = input.lines().map(sanitize_inline_text).collect();

    while matches!(lines.first(), Some(line) if line.is_empty()) {
        lines.remove(0);
    }

    while matches!(lines.last(), Some(line) if line.is_empty()) {
        lines.pop();
    }

    let mut result = Vec::with_capacity(lines.len());
    let mut previous_empty = false;
    for line in lines {
        let is_empty = line.is_empty();
        if is_empty && previous_empty {
            continue;
        }
        previous_empty = is_empty;
        result.push(line);
    }

    result.join("\n")
}
