use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::listing_image::{
    ListingImage as DomainListingImage, NewListingImage as DomainNewListingImage,
};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::imagenes_anuncios)]
pub struct ListingImage {
    pub id: i32,
    pub anuncio_id: i32,
    pub url_imagen: String,
    pub hash: String,
    pub principal: bool,
    pub fecha_creacion: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::imagenes_anuncios)]
pub struct NewListingImage<'a> {
    pub anuncio_id: i32,
    pub url_imagen: &'a str,
    pub hash: &'a str,
    pub principal: bool,
}

impl<'a> NewListingImage<'a> {
    /// Row for `image` attached to `listing_id` with an explicit primary flag.
    pub fn for_listing(listing_id: i32, image: &'a DomainNewListingImage, principal: bool) -> Self {
        Self {
            anuncio_id: listing_id,
            url_imagen: image.path.as_str(),
            hash: image.hash.as_str(),
            principal,
        }
    }
}

impl From<ListingImage> for DomainListingImage {
    fn from(value: ListingImage) -> Self {
        Self {
            id: value.id,
            listing_id: value.anuncio_id,
            path: value.url_imagen,
            hash: value.hash,
            is_primary: value.principal,
            created_at: value.fecha_creacion,
        }
    }
}
