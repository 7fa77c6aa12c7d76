use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::auth::AuthenticatedUser;
use crate::domain::category::Category;
use crate::domain::listing::{
    Listing, ListingChanges, ListingListQuery, ListingSummary, NewListing, UpdateListing,
};
use crate::domain::listing_image::ListingImage;
use crate::domain::location::{City, Commune};
use crate::forms::listings::{FieldError, ListingFields, ListingSubmission, error_messages};
use crate::forms::{empty_string_as_none, lenient_number};
use crate::images::{ExistingImages, ImageIntake, RejectedImage, Watermark};
use crate::pagination::{LISTINGS_PER_PAGE, Paginated, clamp_page, total_pages};
use crate::repository::{CategoryReader, ListingReader, ListingWriter, LocationReader};
use crate::services::{ServiceError, ServiceResult};

const IMAGE_REQUIRED: &str = "Debes subir al menos una imagen";
const NO_IMAGE_ACCEPTED: &str = "Ninguna de las imágenes pudo ser procesada";
const LAST_IMAGE_REMOVED: &str = "El anuncio debe conservar al menos una imagen";
const INVALID_PRIMARY_IMAGE: &str = "La imagen principal seleccionada no pertenece al anuncio";

/// Query parameters accepted by the listing index.
#[derive(Debug, Default, Deserialize)]
pub struct ListingsQuery {
    #[serde(default, deserialize_with = "lenient_number")]
    pub categoria: Option<i32>,
    /// `0` pending moderation, `1` active.
    #[serde(default, deserialize_with = "lenient_number")]
    pub estado: Option<i32>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub ciudad: Option<i32>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub comuna: Option<i32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub buscar: Option<String>,
    /// Page requested by the UI (1-based, clamped).
    #[serde(default, deserialize_with = "lenient_number")]
    pub pagina: Option<i64>,
}

/// Filters echoed back to the index template.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct ListingFilters {
    pub categoria: Option<i32>,
    pub estado: Option<i32>,
    pub ciudad: Option<i32>,
    pub comuna: Option<i32>,
    pub buscar: Option<String>,
}

impl ListingFilters {
    pub fn is_active(&self) -> bool {
        self.categoria.is_some()
            || self.estado.is_some()
            || self.ciudad.is_some()
            || self.comuna.is_some()
            || self.buscar.is_some()
    }
}

/// Data required to render the listing index.
pub struct ListingsPageData {
    pub listings: Paginated<ListingSummary>,
    pub filters: ListingFilters,
    pub categories: Vec<Category>,
    pub cities: Vec<City>,
    /// Communes of the selected city, empty when no city is selected.
    pub communes: Vec<Commune>,
}

/// Data required to render the publish or edit form.
pub struct ListingFormData {
    /// Listing being edited; `None` on the publish page.
    pub listing: Option<Listing>,
    /// Values shown in the inputs.
    pub values: ListingFields,
    pub images: Vec<ListingImage>,
    pub categories: Vec<Category>,
    pub cities: Vec<City>,
    pub communes: Vec<Commune>,
}

/// Entry of the JSON commune lookup.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommuneOption {
    pub id: i32,
    pub nombre: String,
}

impl From<Commune> for CommuneOption {
    fn from(value: Commune) -> Self {
        Self {
            id: value.id,
            nombre: value.name,
        }
    }
}

/// Listing persisted by a create or update, plus the uploads that were skipped.
#[derive(Debug)]
pub struct SavedListing {
    pub listing: Listing,
    pub rejected: Vec<RejectedImage>,
}

/// Loads one page of the user's listings with the filter form reference data.
pub fn load_listings_page<R>(
    repo: &R,
    user: &AuthenticatedUser,
    query: ListingsQuery,
) -> ServiceResult<ListingsPageData>
where
    R: ListingReader + CategoryReader + LocationReader + ?Sized,
{
    let ListingsQuery {
        categoria,
        estado,
        ciudad,
        comuna,
        buscar,
        pagina,
    } = query;

    let estado = estado.filter(|value| *value == 0 || *value == 1);
    let filters = ListingFilters {
        categoria,
        estado,
        ciudad,
        comuna,
        buscar,
    };

    let mut list_query = ListingListQuery::new(user.id);
    if let Some(category_id) = filters.categoria {
        list_query = list_query.category(category_id);
    }
    if let Some(estado) = filters.estado {
        list_query = list_query.active(estado == 1);
    }
    if let Some(city_id) = filters.ciudad {
        list_query = list_query.city(city_id);
    }
    if let Some(commune_id) = filters.comuna {
        list_query = list_query.commune(commune_id);
    }
    if let Some(term) = filters.buscar.as_ref() {
        list_query = list_query.search(term);
    }

    let requested = usize::try_from(pagina.unwrap_or(1).max(1)).unwrap_or(usize::MAX);
    let (mut total, mut items) = repo
        .list_listings(list_query.clone().paginate(requested, LISTINGS_PER_PAGE))
        .map_err(ServiceError::from)?;

    let mut pages = total_pages(total, LISTINGS_PER_PAGE);
    let page = clamp_page(i64::try_from(requested).unwrap_or(i64::MAX), pages);
    if page != requested {
        (total, items) = repo
            .list_listings(list_query.paginate(page, LISTINGS_PER_PAGE))
            .map_err(ServiceError::from)?;
        pages = total_pages(total, LISTINGS_PER_PAGE);
    }

    let categories = repo.list_categories().map_err(ServiceError::from)?;
    let cities = repo.list_cities().map_err(ServiceError::from)?;
    let communes = match filters.ciudad {
        Some(city_id) => repo.list_communes(city_id).map_err(ServiceError::from)?,
        None => Vec::new(),
    };

    Ok(ListingsPageData {
        listings: Paginated::new(items, page, pages, total),
        filters,
        categories,
        cities,
        communes,
    })
}

/// Loads the reference data for the publish page.
pub fn load_new_listing_form<R>(repo: &R) -> ServiceResult<ListingFormData>
where
    R: CategoryReader + LocationReader + ?Sized,
{
    Ok(ListingFormData {
        listing: None,
        values: ListingFields::default(),
        images: Vec::new(),
        categories: repo.list_categories().map_err(ServiceError::from)?,
        cities: repo.list_cities().map_err(ServiceError::from)?,
        communes: Vec::new(),
    })
}

/// Loads a listing of the user with its images for the edit page.
pub fn load_edit_listing_form<R>(
    repo: &R,
    user: &AuthenticatedUser,
    listing_id: i32,
) -> ServiceResult<ListingFormData>
where
    R: ListingReader + CategoryReader + LocationReader + ?Sized,
{
    let listing = repo
        .get_listing_by_id(listing_id, user.id)
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound)?;

    let images = repo
        .list_listing_images(listing.id)
        .map_err(ServiceError::from)?;
    let communes = repo
        .list_communes(listing.city_id)
        .map_err(ServiceError::from)?;

    Ok(ListingFormData {
        values: ListingFields::from(&listing),
        listing: Some(listing),
        images,
        categories: repo.list_categories().map_err(ServiceError::from)?,
        cities: repo.list_cities().map_err(ServiceError::from)?,
        communes,
    })
}

/// Puts rejected submitted values back into a loaded form, with the communes
/// of the submitted city.
pub fn refill_listing_form<R>(
    repo: &R,
    data: &mut ListingFormData,
    fields: ListingFields,
) -> ServiceResult<()>
where
    R: LocationReader + ?Sized,
{
    data.communes = if fields.ciudad_id > 0 {
        repo.list_communes(fields.ciudad_id)
            .map_err(ServiceError::from)?
    } else {
        Vec::new()
    };
    data.values = fields;
    Ok(())
}

/// Communes of `city_id` for the dependent select on the forms.
pub fn list_communes<R>(repo: &R, city_id: i32) -> ServiceResult<Vec<CommuneOption>>
where
    R: LocationReader + ?Sized,
{
    if city_id <= 0 {
        return Ok(Vec::new());
    }

    let communes = repo.list_communes(city_id).map_err(ServiceError::from)?;
    Ok(communes.into_iter().map(CommuneOption::from).collect())
}

/// Database checks for the category, city and commune ids.
///
/// Non-positive ids are already reported by field validation and skipped here.
pub fn validate_references<R>(repo: &R, fields: &ListingFields) -> ServiceResult<Vec<FieldError>>
where
    R: CategoryReader + LocationReader + ?Sized,
{
    let mut errors = Vec::new();

    if fields.categoria_id > 0
        && repo
            .get_category_by_id(fields.categoria_id)
            .map_err(ServiceError::from)?
            .is_none()
    {
        errors.push(FieldError::new(
            "categoria_id",
            "La categoría seleccionada no existe",
        ));
    }

    if fields.ciudad_id > 0
        && repo
            .get_city_by_id(fields.ciudad_id)
            .map_err(ServiceError::from)?
            .is_none()
    {
        errors.push(FieldError::new("ciudad_id", "La ciudad seleccionada no existe"));
    }

    if fields.comuna_id > 0 {
        match repo
            .get_commune_by_id(fields.comuna_id)
            .map_err(ServiceError::from)?
        {
            None => errors.push(FieldError::new("comuna_id", "La comuna seleccionada no existe")),
            Some(commune) if !commune.belongs_to(fields.ciudad_id) => errors.push(
                FieldError::new("comuna_id", "La comuna no pertenece a la ciudad seleccionada"),
            ),
            Some(_) => {}
        }
    }

    Ok(errors)
}

/// Sanitize the fields and run syntactic plus referential validation.
fn checked_fields<R>(
    repo: &R,
    fields: ListingFields,
) -> ServiceResult<(ListingFields, Vec<FieldError>)>
where
    R: CategoryReader + LocationReader + ?Sized,
{
    let fields = fields.sanitized();
    let mut errors = fields.field_errors();
    errors.extend(validate_references(repo, &fields)?);
    Ok((fields, errors))
}

/// Validates the submission, runs the image intake and stores a new listing.
pub fn create_listing<R, W>(
    repo: &R,
    intake: &ImageIntake<W>,
    user: &AuthenticatedUser,
    submission: ListingSubmission,
) -> ServiceResult<SavedListing>
where
    R: CategoryReader + LocationReader + ListingWriter + ?Sized,
    W: Watermark,
{
    let ListingSubmission {
        fields, uploads, ..
    } = submission;

    let (fields, errors) = checked_fields(repo, fields)?;
    let mut messages = error_messages(errors);
    if uploads.is_empty() {
        messages.push(IMAGE_REQUIRED.to_string());
    }
    if !messages.is_empty() {
        return Err(ServiceError::Validation(messages));
    }

    let outcome = intake.process(uploads, &ExistingImages::none());
    if outcome.accepted.is_empty() {
        let mut messages: Vec<String> = outcome.rejected.iter().map(ToString::to_string).collect();
        messages.push(NO_IMAGE_ACCEPTED.to_string());
        return Err(ServiceError::Validation(messages));
    }

    let new_listing = NewListing::new(user.id, fields.into_details());
    let listing = match repo.create_listing(&new_listing, &outcome.accepted) {
        Ok(listing) => listing,
        Err(err) => {
            intake.discard(&outcome.accepted);
            return Err(ServiceError::from(err));
        }
    };

    log::info!(
        "User {} created listing {} with {} images",
        user.id,
        listing.id,
        outcome.accepted.len()
    );

    Ok(SavedListing {
        listing,
        rejected: outcome.rejected,
    })
}

/// Applies field changes, image removals, new uploads and the primary image
/// choice to a listing of the user in one transaction.
pub fn update_listing<R, W>(
    repo: &R,
    intake: &ImageIntake<W>,
    user: &AuthenticatedUser,
    listing_id: i32,
    submission: ListingSubmission,
) -> ServiceResult<SavedListing>
where
    R: CategoryReader + LocationReader + ListingReader + ListingWriter + ?Sized,
    W: Watermark,
{
    let ListingSubmission {
        fields,
        uploads,
        removed_image_ids,
        primary_image_id,
    } = submission;

    repo.get_listing_by_id(listing_id, user.id)
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound)?;

    let current_images = repo
        .list_listing_images(listing_id)
        .map_err(ServiceError::from)?;
    let removed: HashSet<i32> = removed_image_ids.iter().copied().collect();
    let kept: Vec<&ListingImage> = current_images
        .iter()
        .filter(|image| !removed.contains(&image.id))
        .collect();

    let (fields, mut errors) = checked_fields(repo, fields)?;
    if primary_image_id.is_some_and(|primary_id| !kept.iter().any(|image| image.id == primary_id)) {
        errors.push(FieldError::new("imagen_principal", INVALID_PRIMARY_IMAGE));
    }
    let messages = error_messages(errors);
    if !messages.is_empty() {
        return Err(ServiceError::Validation(messages));
    }

    let existing = ExistingImages {
        hashes: kept.iter().map(|image| image.hash.clone()).collect(),
        count: kept.len(),
    };
    let outcome = intake.process(uploads, &existing);

    if kept.is_empty() && outcome.accepted.is_empty() {
        let mut messages: Vec<String> = outcome.rejected.iter().map(ToString::to_string).collect();
        messages.push(LAST_IMAGE_REMOVED.to_string());
        return Err(ServiceError::Validation(messages));
    }

    let changes = ListingChanges {
        updates: UpdateListing::new(fields.into_details()),
        removed_image_ids,
        new_images: outcome.accepted,
        primary_image_id,
    };

    let updated = match repo.update_listing(listing_id, user.id, &changes) {
        Ok(updated) => updated,
        Err(err) => {
            intake.discard(&changes.new_images);
            return Err(ServiceError::from(err));
        }
    };

    for path in &updated.removed_paths {
        if let Err(err) = intake.storage().remove(path) {
            log::warn!("Failed to delete removed image file {path}: {err}");
        }
    }

    log::info!(
        "User {} updated listing {}: {} images added, {} removed",
        user.id,
        listing_id,
        changes.new_images.len(),
        updated.removed_paths.len()
    );

    Ok(SavedListing {
        listing: updated.listing,
        rejected: outcome.rejected,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::domain::listing::{ListingStats, UpdatedListing};
    use crate::domain::listing_image::NewListingImage;
    use crate::images::intake::content_hash;
    use crate::images::{FileStorage, RejectionReason, UploadedImage, WatermarkError};
    use crate::repository::mock::{
        MockCategoryReader, MockListingReader, MockListingWriter, MockLocationReader,
    };
    use crate::repository::{RepositoryError, RepositoryResult};

    struct NoMark;

    impl Watermark for NoMark {
        fn apply(&self, _path: &Path) -> Result<(), WatermarkError> {
            Ok(())
        }
    }

    struct MockRepo {
        categories: MockCategoryReader,
        locations: MockLocationReader,
        reader: MockListingReader,
        writer: MockListingWriter,
    }

    impl MockRepo {
        fn new() -> Self {
            Self {
                categories: MockCategoryReader::new(),
                locations: MockLocationReader::new(),
                reader: MockListingReader::new(),
                writer: MockListingWriter::new(),
            }
        }

        /// Category 1, city 1 and communes 1 (city 1) and 4 (city 2) exist.
        fn with_reference_data() -> Self {
            let mut repo = Self::new();
            repo.categories
                .expect_get_category_by_id()
                .returning(|id| Ok((id == 1).then(|| category(1))));
            repo.categories
                .expect_list_categories()
                .returning(|| Ok(vec![category(1)]));
            repo.locations.expect_get_city_by_id().returning(|id| {
                Ok((id == 1).then(|| City {
                    id: 1,
                    name: "Santiago".into(),
                }))
            });
            repo.locations.expect_list_cities().returning(|| {
                Ok(vec![City {
                    id: 1,
                    name: "Santiago".into(),
                }])
            });
            repo.locations
                .expect_get_commune_by_id()
                .returning(|id| Ok(commune(id)));
            repo.locations
                .expect_list_communes()
                .returning(|city_id| Ok(commune(1).into_iter().filter(|c| c.city_id == city_id).collect()));
            repo
        }
    }

    impl CategoryReader for MockRepo {
        fn list_categories(&self) -> RepositoryResult<Vec<Category>> {
            self.categories.list_categories()
        }

        fn get_category_by_id(&self, id: i32) -> RepositoryResult<Option<Category>> {
            self.categories.get_category_by_id(id)
        }
    }

    impl LocationReader for MockRepo {
        fn list_cities(&self) -> RepositoryResult<Vec<City>> {
            self.locations.list_cities()
        }

        fn get_city_by_id(&self, id: i32) -> RepositoryResult<Option<City>> {
            self.locations.get_city_by_id(id)
        }

        fn list_communes(&self, city_id: i32) -> RepositoryResult<Vec<Commune>> {
            self.locations.list_communes(city_id)
        }

        fn get_commune_by_id(&self, id: i32) -> RepositoryResult<Option<Commune>> {
            self.locations.get_commune_by_id(id)
        }
    }

    impl ListingReader for MockRepo {
        fn get_listing_by_id(&self, id: i32, owner_id: i32) -> RepositoryResult<Option<Listing>> {
            self.reader.get_listing_by_id(id, owner_id)
        }

        fn list_listings(
            &self,
            query: ListingListQuery,
        ) -> RepositoryResult<(usize, Vec<ListingSummary>)> {
            self.reader.list_listings(query)
        }

        fn list_listing_images(&self, listing_id: i32) -> RepositoryResult<Vec<ListingImage>> {
            self.reader.list_listing_images(listing_id)
        }

        fn listing_stats(&self, owner_id: i32) -> RepositoryResult<ListingStats> {
            self.reader.listing_stats(owner_id)
        }
    }

    impl ListingWriter for MockRepo {
        fn create_listing(
            &self,
            new_listing: &NewListing,
            images: &[NewListingImage],
        ) -> RepositoryResult<Listing> {
            self.writer.create_listing(new_listing, images)
        }

        fn update_listing(
            &self,
            listing_id: i32,
            owner_id: i32,
            changes: &ListingChanges,
        ) -> RepositoryResult<UpdatedListing> {
            self.writer.update_listing(listing_id, owner_id, changes)
        }
    }

    fn fixed_datetime() -> NaiveDateTime {
        match NaiveDate::from_ymd_opt(2025, 1, 10) {
            Some(date) => date.and_hms_opt(12, 0, 0).unwrap_or_default(),
            None => NaiveDateTime::default(),
        }
    }

    fn category(id: i32) -> Category {
        Category {
            id,
            name: "Masajes".into(),
        }
    }

    fn commune(id: i32) -> Option<Commune> {
        match id {
            1 => Some(Commune {
                id: 1,
                city_id: 1,
                name: "Providencia".into(),
            }),
            4 => Some(Commune {
                id: 4,
                city_id: 2,
                name: "Viña del Mar".into(),
            }),
            _ => None,
        }
    }

    fn user() -> AuthenticatedUser {
        AuthenticatedUser::new(10)
    }

    fn fields() -> ListingFields {
        ListingFields {
            categoria_id: 1,
            ciudad_id: 1,
            comuna_id: 1,
            edad: 30,
            titulo: "Masajes relajantes en Providencia, atención cálida".into(),
            descripcion: "Sesiones de masaje relajante con aceites esenciales en un ambiente \
                          tranquilo. Atiendo de lunes a sábado con reserva previa por teléfono \
                          o por correo electrónico."
                .into(),
            telefono: "+56912345678".into(),
            whatsapp: false,
            correo: "contacto@example.cl".into(),
        }
    }

    fn listing(id: i32) -> Listing {
        Listing {
            id,
            owner_id: 10,
            category_id: 1,
            city_id: 1,
            commune_id: 1,
            age: 30,
            title: fields().titulo,
            description: fields().descripcion,
            phone: "+56 9 1234 5678".into(),
            whatsapp: false,
            email: "contacto@example.cl".into(),
            is_active: false,
            is_top: false,
            created_at: fixed_datetime(),
            updated_at: fixed_datetime(),
        }
    }

    fn stored_image(id: i32, listing_id: i32, bytes: &[u8], is_primary: bool) -> ListingImage {
        ListingImage {
            id,
            listing_id,
            path: format!("stored-{id}.jpg"),
            hash: content_hash(bytes),
            is_primary,
            created_at: fixed_datetime(),
        }
    }

    fn upload(name: &str, bytes: &[u8]) -> UploadedImage {
        UploadedImage {
            file_name: Some(name.into()),
            content_type: Some("image/jpeg".into()),
            size: bytes.len(),
            bytes: bytes.to_vec(),
        }
    }

    fn submission(uploads: Vec<UploadedImage>) -> ListingSubmission {
        ListingSubmission {
            uploads,
            ..ListingSubmission::new(fields())
        }
    }

    fn stored_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    #[test]
    fn create_listing_persists_one_primary_image() {
        let dir = tempfile::tempdir().expect("temp dir");
        let intake = ImageIntake::new(FileStorage::new(dir.path()), NoMark);
        let mut repo = MockRepo::with_reference_data();
        repo.writer
            .expect_create_listing()
            .withf(|new_listing, images| {
                new_listing.owner_id == 10
                    && new_listing.details.phone == "+56 9 1234 5678"
                    && images.len() == 2
                    && images.iter().filter(|image| image.is_primary).count() == 1
                    && images[0].is_primary
            })
            .times(1)
            .returning(|_, _| Ok(listing(1)));

        let saved = create_listing(
            &repo,
            &intake,
            &user(),
            submission(vec![upload("a.jpg", b"a"), upload("b.jpg", b"b")]),
        )
        .expect("expected success");

        assert_eq!(saved.listing.id, 1);
        assert!(saved.rejected.is_empty());
        assert_eq!(stored_files(dir.path()), 2);
    }

    #[test]
    fn create_listing_reports_duplicate_uploads() {
        let dir = tempfile::tempdir().expect("temp dir");
        let intake = ImageIntake::new(FileStorage::new(dir.path()), NoMark);
        let mut repo = MockRepo::with_reference_data();
        repo.writer
            .expect_create_listing()
            .withf(|_, images| images.len() == 1)
            .times(1)
            .returning(|_, _| Ok(listing(1)));

        let saved = create_listing(
            &repo,
            &intake,
            &user(),
            submission(vec![upload("a.jpg", b"same"), upload("b.jpg", b"same")]),
        )
        .expect("expected success");

        assert_eq!(saved.rejected.len(), 1);
        assert_eq!(saved.rejected[0].reason, RejectionReason::Duplicate);
    }

    #[test]
    fn create_listing_rejects_commune_of_another_city() {
        let dir = tempfile::tempdir().expect("temp dir");
        let intake = ImageIntake::new(FileStorage::new(dir.path()), NoMark);
        let mut repo = MockRepo::with_reference_data();
        repo.writer.expect_create_listing().times(0);

        let mut submission = submission(vec![upload("a.jpg", b"a")]);
        submission.fields.comuna_id = 4;

        let result = create_listing(&repo, &intake, &user(), submission);

        match result {
            Err(ServiceError::Validation(errors)) => assert_eq!(
                errors,
                vec!["La comuna no pertenece a la ciudad seleccionada".to_string()]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(stored_files(dir.path()), 0);
    }

    #[test]
    fn create_listing_collects_field_and_reference_errors_in_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let intake = ImageIntake::new(FileStorage::new(dir.path()), NoMark);
        let repo = MockRepo::with_reference_data();

        let mut submission = submission(Vec::new());
        submission.fields.categoria_id = 9;
        submission.fields.edad = 15;

        let result = create_listing(&repo, &intake, &user(), submission);

        match result {
            Err(ServiceError::Validation(errors)) => assert_eq!(
                errors,
                vec![
                    "La categoría seleccionada no existe".to_string(),
                    "La edad debe estar entre 18 y 99 años".to_string(),
                    IMAGE_REQUIRED.to_string(),
                ]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_listing_discards_files_when_persistence_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let intake = ImageIntake::new(FileStorage::new(dir.path()), NoMark);
        let mut repo = MockRepo::with_reference_data();
        repo.writer
            .expect_create_listing()
            .returning(|_, _| Err(RepositoryError::ConstraintViolation("boom".into())));

        let result = create_listing(
            &repo,
            &intake,
            &user(),
            submission(vec![upload("a.jpg", b"a")]),
        );

        assert!(matches!(result, Err(ServiceError::Repository(_))));
        assert_eq!(stored_files(dir.path()), 0);
    }

    #[test]
    fn update_listing_of_another_owner_is_not_found() {
        let dir = tempfile::tempdir().expect("temp dir");
        let intake = ImageIntake::new(FileStorage::new(dir.path()), NoMark);
        let mut repo = MockRepo::with_reference_data();
        repo.reader
            .expect_get_listing_by_id()
            .withf(|id, owner_id| *id == 5 && *owner_id == 10)
            .returning(|_, _| Ok(None));
        repo.writer.expect_update_listing().times(0);

        let result = update_listing(&repo, &intake, &user(), 5, submission(Vec::new()));

        assert!(matches!(result, Err(ServiceError::NotFound)));
    }

    #[test]
    fn update_listing_skips_upload_matching_stored_image() {
        let dir = tempfile::tempdir().expect("temp dir");
        let intake = ImageIntake::new(FileStorage::new(dir.path()), NoMark);
        let mut repo = MockRepo::with_reference_data();
        repo.reader
            .expect_get_listing_by_id()
            .returning(|id, _| Ok(Some(listing(id))));
        repo.reader
            .expect_list_listing_images()
            .returning(|listing_id| Ok(vec![stored_image(1, listing_id, b"stored", true)]));
        repo.writer
            .expect_update_listing()
            .withf(|_, _, changes| changes.new_images.is_empty())
            .returning(|listing_id, _, _| {
                Ok(UpdatedListing {
                    listing: listing(listing_id),
                    images: vec![stored_image(1, listing_id, b"stored", true)],
                    removed_paths: Vec::new(),
                })
            });

        let saved = update_listing(
            &repo,
            &intake,
            &user(),
            3,
            submission(vec![upload("again.jpg", b"stored")]),
        )
        .expect("expected success");

        assert_eq!(saved.rejected[0].reason, RejectionReason::Duplicate);
        assert_eq!(stored_files(dir.path()), 0);
    }

    #[test]
    fn update_listing_removes_files_after_commit() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = FileStorage::new(dir.path());
        let removed_key = storage.store(Some("old.jpg"), b"old").expect("store file");
        let intake = ImageIntake::new(storage, NoMark);

        let mut repo = MockRepo::with_reference_data();
        repo.reader
            .expect_get_listing_by_id()
            .returning(|id, _| Ok(Some(listing(id))));
        repo.reader.expect_list_listing_images().returning(|listing_id| {
            Ok(vec![
                stored_image(1, listing_id, b"old", true),
                stored_image(2, listing_id, b"kept", false),
            ])
        });
        let returned_key = removed_key.clone();
        repo.writer
            .expect_update_listing()
            .withf(|_, _, changes| {
                changes.removed_image_ids == vec![1] && changes.primary_image_id.is_none()
            })
            .returning(move |listing_id, _, _| {
                Ok(UpdatedListing {
                    listing: listing(listing_id),
                    images: vec![stored_image(2, listing_id, b"kept", true)],
                    removed_paths: vec![returned_key.clone()],
                })
            });

        let mut submission = submission(Vec::new());
        submission.removed_image_ids = vec![1];

        update_listing(&repo, &intake, &user(), 3, submission).expect("expected success");

        assert!(!dir.path().join(&removed_key).exists());
    }

    #[test]
    fn update_listing_requires_one_remaining_image() {
        let dir = tempfile::tempdir().expect("temp dir");
        let intake = ImageIntake::new(FileStorage::new(dir.path()), NoMark);
        let mut repo = MockRepo::with_reference_data();
        repo.reader
            .expect_get_listing_by_id()
            .returning(|id, _| Ok(Some(listing(id))));
        repo.reader
            .expect_list_listing_images()
            .returning(|listing_id| Ok(vec![stored_image(1, listing_id, b"only", true)]));
        repo.writer.expect_update_listing().times(0);

        let mut submission = submission(Vec::new());
        submission.removed_image_ids = vec![1];

        let result = update_listing(&repo, &intake, &user(), 3, submission);

        match result {
            Err(ServiceError::Validation(errors)) => {
                assert_eq!(errors, vec![LAST_IMAGE_REMOVED.to_string()])
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn update_listing_rejects_primary_image_outside_listing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let intake = ImageIntake::new(FileStorage::new(dir.path()), NoMark);
        let mut repo = MockRepo::with_reference_data();
        repo.reader
            .expect_get_listing_by_id()
            .returning(|id, _| Ok(Some(listing(id))));
        repo.reader
            .expect_list_listing_images()
            .returning(|listing_id| Ok(vec![stored_image(1, listing_id, b"only", true)]));
        repo.writer.expect_update_listing().times(0);

        let mut submission = submission(Vec::new());
        submission.primary_image_id = Some(99);

        let result = update_listing(&repo, &intake, &user(), 3, submission);

        match result {
            Err(ServiceError::Validation(errors)) => {
                assert_eq!(errors, vec![INVALID_PRIMARY_IMAGE.to_string()])
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn listings_page_clamps_page_beyond_last() {
        let mut repo = MockRepo::with_reference_data();
        repo.reader
            .expect_list_listings()
            .withf(|query| query.pagination.map(|p| p.page) == Some(9))
            .times(1)
            .returning(|_| Ok((12, Vec::new())));
        repo.reader
            .expect_list_listings()
            .withf(|query| {
                query.owner_id == 10
                    && query.active == Some(true)
                    && query.pagination.map(|p| (p.page, p.per_page)) == Some((3, 5))
            })
            .times(1)
            .returning(|_| Ok((12, Vec::new())));

        let query = ListingsQuery {
            estado: Some(1),
            pagina: Some(9),
            ..ListingsQuery::default()
        };

        let data = load_listings_page(&repo, &user(), query).expect("expected page");

        assert_eq!(data.listings.page, 3);
        assert_eq!(data.listings.total_pages, 3);
        assert_eq!(data.filters.estado, Some(1));
    }

    #[test]
    fn listings_page_clamps_non_positive_page_to_first() {
        let mut repo = MockRepo::with_reference_data();
        repo.reader
            .expect_list_listings()
            .withf(|query| query.pagination.map(|p| p.page) == Some(1))
            .times(1)
            .returning(|_| Ok((2, Vec::new())));

        let query = ListingsQuery {
            pagina: Some(-3),
            estado: Some(7),
            ciudad: Some(1),
            ..ListingsQuery::default()
        };

        let data = load_listings_page(&repo, &user(), query).expect("expected page");

        assert_eq!(data.listings.page, 1);
        assert_eq!(data.filters.estado, None);
        assert_eq!(data.communes.len(), 1);
    }

    #[test]
    fn communes_lookup_maps_to_options() {
        let repo = MockRepo::with_reference_data();

        let options = list_communes(&repo, 1).expect("expected communes");

        assert_eq!(
            options,
            vec![CommuneOption {
                id: 1,
                nombre: "Providencia".into(),
            }]
        );
        assert!(list_communes(&repo, 0).expect("expected communes").is_empty());
    }

    #[test]
    fn edit_form_values_come_from_the_listing() {
        let mut repo = MockRepo::with_reference_data();
        repo.reader
            .expect_get_listing_by_id()
            .returning(|id, _| Ok(Some(listing(id))));
        repo.reader
            .expect_list_listing_images()
            .returning(|_| Ok(Vec::new()));

        let data = load_edit_listing_form(&repo, &user(), 3).expect("expected success");

        assert_eq!(data.values.titulo, listing(3).title);
        assert_eq!(data.values.telefono, "+56 9 1234 5678");
        assert_eq!(data.values.comuna_id, 1);
    }

    #[test]
    fn refill_listing_form_keeps_submitted_values_and_city_communes() {
        let repo = MockRepo::with_reference_data();
        let mut data = load_new_listing_form(&repo).expect("expected success");
        assert!(data.communes.is_empty());

        let mut submitted = fields();
        submitted.titulo = "Demasiado corto".into();
        refill_listing_form(&repo, &mut data, submitted.clone()).expect("expected success");

        assert_eq!(data.values, submitted);
        assert_eq!(data.communes.len(), 1);
        assert_eq!(data.communes[0].name, "Providencia");

        submitted.ciudad_id = 0;
        refill_listing_form(&repo, &mut data, submitted).expect("expected success");
        assert!(data.communes.is_empty());
    }
}
