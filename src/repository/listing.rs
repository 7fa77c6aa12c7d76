use diesel::dsl::{exists, select};
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};

use crate::domain::listing::{
    Listing as DomainListing, ListingChanges, ListingListQuery, ListingStats, ListingSummary,
    NewListing as DomainNewListing, UpdatedListing,
};
use crate::domain::listing_image::{
    ListingImage as DomainListingImage, NewListingImage as DomainNewListingImage,
};
use crate::models::listing::{
    Listing as DbListing, NewListing as DbNewListing, UpdateListing as DbUpdateListing,
};
use crate::models::listing_image::{
    ListingImage as DbListingImage, NewListingImage as DbNewListingImage,
};
use crate::repository::{
    DieselRepository, ListingReader, ListingWriter, MAX_IMAGES_PER_LISTING, RepositoryError,
    RepositoryResult,
};

type SummaryRow = (
    DbListing,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

impl ListingReader for DieselRepository {
    fn get_listing_by_id(&self, id: i32, owner_id: i32) -> RepositoryResult<Option<DomainListing>> {
        use crate::schema::anuncios;

        let mut conn = self.conn()?;
        let listing = anuncios::table
            .filter(anuncios::id.eq(id))
            .filter(anuncios::usuario_id.eq(owner_id))
            .first::<DbListing>(&mut conn)
            .optional()?;

        Ok(listing.map(DomainListing::from))
    }

    fn list_listings(
        &self,
        query: ListingListQuery,
    ) -> RepositoryResult<(usize, Vec<ListingSummary>)> {
        use crate::schema::{anuncios, categorias, ciudades, comunas, imagenes_anuncios};

        let mut conn = self.conn()?;

        let mut count_query = anuncios::table
            .filter(anuncios::usuario_id.eq(query.owner_id))
            .into_boxed::<Sqlite>();

        if let Some(category_id) = query.category_id {
            count_query = count_query.filter(anuncios::categoria_id.eq(category_id));
        }
        if let Some(active) = query.active {
            count_query = count_query.filter(anuncios::activo.eq(active));
        }
        if let Some(city_id) = query.city_id {
            count_query = count_query.filter(anuncios::ciudad_id.eq(city_id));
        }
        if let Some(commune_id) = query.commune_id {
            count_query = count_query.filter(anuncios::comuna_id.eq(commune_id));
        }
        if let Some(term) = query.search.as_ref() {
            let pattern = like_pattern(term);
            count_query = count_query.filter(
                anuncios::titulo
                    .like(pattern.clone())
                    .escape('\\')
                    .or(anuncios::descripcion.like(pattern).escape('\\')),
            );
        }

        let total = count_query.count().get_result::<i64>(&mut conn)? as usize;

        let mut items = anuncios::table
            .left_join(categorias::table.on(categorias::id.eq(anuncios::categoria_id)))
            .left_join(ciudades::table.on(ciudades::id.eq(anuncios::ciudad_id)))
            .left_join(comunas::table.on(comunas::id.eq(anuncios::comuna_id)))
            .left_join(
                imagenes_anuncios::table.on(imagenes_anuncios::anuncio_id
                    .eq(anuncios::id)
                    .and(imagenes_anuncios::principal.eq(true))),
            )
            .select((
                DbListing::as_select(),
                categorias::nombre.nullable(),
                ciudades::nombre.nullable(),
                comunas::nombre.nullable(),
                imagenes_anuncios::url_imagen.nullable(),
            ))
            .filter(anuncios::usuario_id.eq(query.owner_id))
            .into_boxed::<Sqlite>();

        if let Some(category_id) = query.category_id {
            items = items.filter(anuncios::categoria_id.eq(category_id));
        }
        if let Some(active) = query.active {
            items = items.filter(anuncios::activo.eq(active));
        }
        if let Some(city_id) = query.city_id {
            items = items.filter(anuncios::ciudad_id.eq(city_id));
        }
        if let Some(commune_id) = query.commune_id {
            items = items.filter(anuncios::comuna_id.eq(commune_id));
        }
        if let Some(term) = query.search.as_ref() {
            let pattern = like_pattern(term);
            items = items.filter(
                anuncios::titulo
                    .like(pattern.clone())
                    .escape('\\')
                    .or(anuncios::descripcion.like(pattern).escape('\\')),
            );
        }

        items = items.order((anuncios::fecha_creacion.desc(), anuncios::id.desc()));

        if let Some(pagination) = &query.pagination {
            items = items
                .offset(pagination.offset())
                .limit(pagination.limit());
        }

        let rows = items.load::<SummaryRow>(&mut conn)?;

        let summaries = rows
            .into_iter()
            .map(
                |(listing, category_name, city_name, commune_name, primary_image)| ListingSummary {
                    listing: listing.into(),
                    category_name,
                    city_name,
                    commune_name,
                    primary_image,
                },
            )
            .collect();

        Ok((total, summaries))
    }

    fn list_listing_images(&self, listing_id: i32) -> RepositoryResult<Vec<DomainListingImage>> {
        let mut conn = self.conn()?;
        load_images(&mut conn, listing_id)
    }

    fn listing_stats(&self, owner_id: i32) -> RepositoryResult<ListingStats> {
        use crate::schema::anuncios;

        let mut conn = self.conn()?;

        let total = anuncios::table
            .filter(anuncios::usuario_id.eq(owner_id))
            .count()
            .get_result::<i64>(&mut conn)? as usize;

        let active = anuncios::table
            .filter(anuncios::usuario_id.eq(owner_id))
            .filter(anuncios::activo.eq(true))
            .count()
            .get_result::<i64>(&mut conn)? as usize;

        let promoted = anuncios::table
            .filter(anuncios::usuario_id.eq(owner_id))
            .filter(anuncios::top.eq(true))
            .count()
            .get_result::<i64>(&mut conn)? as usize;

        Ok(ListingStats {
            total,
            active,
            pending: total - active,
            promoted,
        })
    }
}

impl ListingWriter for DieselRepository {
    fn create_listing(
        &self,
        new_listing: &DomainNewListing,
        images: &[DomainNewListingImage],
    ) -> RepositoryResult<DomainListing> {
        use crate::schema::{anuncios, imagenes_anuncios};

        if images.is_empty() || images.len() > MAX_IMAGES_PER_LISTING {
            return Err(RepositoryError::ConstraintViolation(format!(
                "a listing needs between 1 and {MAX_IMAGES_PER_LISTING} images, got {}",
                images.len()
            )));
        }

        let mut conn = self.conn()?;

        conn.transaction::<DomainListing, RepositoryError, _>(|conn| {
            let insertable = DbNewListing::from(new_listing);
            let created = diesel::insert_into(anuncios::table)
                .values(&insertable)
                .get_result::<DbListing>(conn)?;

            for (index, image) in images.iter().enumerate() {
                let row = DbNewListingImage::for_listing(created.id, image, index == 0);
                diesel::insert_into(imagenes_anuncios::table)
                    .values(&row)
                    .execute(conn)?;
            }

            Ok(created.into())
        })
    }

    fn update_listing(
        &self,
        listing_id: i32,
        owner_id: i32,
        changes: &ListingChanges,
    ) -> RepositoryResult<UpdatedListing> {
        use crate::schema::{anuncios, imagenes_anuncios};

        let mut conn = self.conn()?;

        conn.transaction::<UpdatedListing, RepositoryError, _>(|conn| {
            ensure_listing_with_owner(conn, listing_id, owner_id)?;

            let db_updates = DbUpdateListing::from(&changes.updates);
            diesel::update(
                anuncios::table
                    .filter(anuncios::id.eq(listing_id))
                    .filter(anuncios::usuario_id.eq(owner_id)),
            )
            .set(&db_updates)
            .execute(conn)?;

            let mut removed_paths = Vec::new();
            for image_id in &changes.removed_image_ids {
                let path = imagenes_anuncios::table
                    .filter(imagenes_anuncios::id.eq(*image_id))
                    .filter(imagenes_anuncios::anuncio_id.eq(listing_id))
                    .select(imagenes_anuncios::url_imagen)
                    .first::<String>(conn)
                    .optional()?;

                if let Some(path) = path {
                    diesel::delete(
                        imagenes_anuncios::table
                            .filter(imagenes_anuncios::id.eq(*image_id))
                            .filter(imagenes_anuncios::anuncio_id.eq(listing_id)),
                    )
                    .execute(conn)?;
                    removed_paths.push(path);
                }
            }

            for image in &changes.new_images {
                let row = DbNewListingImage::for_listing(listing_id, image, false);
                diesel::insert_into(imagenes_anuncios::table)
                    .values(&row)
                    .execute(conn)?;
            }

            if let Some(primary_id) = changes.primary_image_id {
                set_primary_image(conn, listing_id, primary_id)?;
            }

            promote_primary_if_missing(conn, listing_id)?;

            let images = load_images(conn, listing_id)?;
            if images.is_empty() || images.len() > MAX_IMAGES_PER_LISTING {
                return Err(RepositoryError::ConstraintViolation(format!(
                    "listing {listing_id} would end with {} images",
                    images.len()
                )));
            }

            let listing = anuncios::table
                .filter(anuncios::id.eq(listing_id))
                .first::<DbListing>(conn)?;

            Ok(UpdatedListing {
                listing: listing.into(),
                images,
                removed_paths,
            })
        })
    }
}

fn ensure_listing_with_owner(
    conn: &mut SqliteConnection,
    listing_id: i32,
    owner_id: i32,
) -> RepositoryResult<()> {
    use crate::schema::anuncios;

    let exists = select(exists(
        anuncios::table
            .filter(anuncios::id.eq(listing_id))
            .filter(anuncios::usuario_id.eq(owner_id)),
    ))
    .get_result(conn)?;

    if exists {
        Ok(())
    } else {
        Err(RepositoryError::NotFound)
    }
}

fn load_images(
    conn: &mut SqliteConnection,
    listing_id: i32,
) -> RepositoryResult<Vec<DomainListingImage>> {
    use crate::schema::imagenes_anuncios;

    let rows = imagenes_anuncios::table
        .filter(imagenes_anuncios::anuncio_id.eq(listing_id))
        .order(imagenes_anuncios::id.asc())
        .load::<DbListingImage>(conn)?;

    Ok(rows.into_iter().map(DomainListingImage::from).collect())
}

/// Move the primary flag to `image_id`. Clearing first keeps the partial
/// unique index on primary images satisfied at every step.
fn set_primary_image(
    conn: &mut SqliteConnection,
    listing_id: i32,
    image_id: i32,
) -> RepositoryResult<()> {
    use crate::schema::imagenes_anuncios;

    diesel::update(imagenes_anuncios::table.filter(imagenes_anuncios::anuncio_id.eq(listing_id)))
        .set(imagenes_anuncios::principal.eq(false))
        .execute(conn)?;

    let updated = diesel::update(
        imagenes_anuncios::table
            .filter(imagenes_anuncios::id.eq(image_id))
            .filter(imagenes_anuncios::anuncio_id.eq(listing_id)),
    )
    .set(imagenes_anuncios::principal.eq(true))
    .execute(conn)?;

    if updated == 0 {
        return Err(RepositoryError::ConstraintViolation(format!(
            "image {image_id} does not belong to listing {listing_id}"
        )));
    }

    Ok(())
}

fn promote_primary_if_missing(conn: &mut SqliteConnection, listing_id: i32) -> RepositoryResult<()> {
    use crate::schema::imagenes_anuncios;

    let has_primary = select(exists(
        imagenes_anuncios::table
            .filter(imagenes_anuncios::anuncio_id.eq(listing_id))
            .filter(imagenes_anuncios::principal.eq(true)),
    ))
    .get_result::<bool>(conn)?;

    if has_primary {
        return Ok(());
    }

    let oldest = imagenes_anuncios::table
        .filter(imagenes_anuncios::anuncio_id.eq(listing_id))
        .order(imagenes_anuncios::id.asc())
        .select(imagenes_anuncios::id)
        .first::<i32>(conn)
        .optional()?;

    if let Some(image_id) = oldest {
        diesel::update(imagenes_anuncios::table.filter(imagenes_anuncios::id.eq(image_id)))
            .set(imagenes_anuncios::principal.eq(true))
            .execute(conn)?;
    }

    Ok(())
}

/// Substring `LIKE` pattern with `%`, `_` and `\` matched literally.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
