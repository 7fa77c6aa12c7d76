use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::listing::{
    Listing as DomainListing, NewListing as DomainNewListing,
    UpdateListing as DomainUpdateListing,
};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::anuncios)]
pub struct Listing {
    pub id: i32,
    pub usuario_id: i32,
    pub categoria_id: i32,
    pub ciudad_id: i32,
    pub comuna_id: i32,
    pub edad: i32,
    pub titulo: String,
    pub descripcion: String,
    pub telefono: String,
    pub whatsapp: bool,
    pub correo_electronico: String,
    pub activo: bool,
    pub top: bool,
    pub fecha_creacion: NaiveDateTime,
    pub fecha_actualizacion: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::anuncios)]
pub struct NewListing<'a> {
    pub usuario_id: i32,
    pub categoria_id: i32,
    pub ciudad_id: i32,
    pub comuna_id: i32,
    pub edad: i32,
    pub titulo: &'a str,
    pub descripcion: &'a str,
    pub telefono: &'a str,
    pub whatsapp: bool,
    pub correo_electronico: &'a str,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::anuncios)]
pub struct UpdateListing<'a> {
    pub categoria_id: i32,
    pub ciudad_id: i32,
    pub comuna_id: i32,
    pub edad: i32,
    pub titulo: &'a str,
    pub descripcion: &'a str,
    pub telefono: &'a str,
    pub whatsapp: bool,
    pub correo_electronico: &'a str,
    pub fecha_actualizacion: NaiveDateTime,
}

impl From<Listing> for DomainListing {
    fn from(value: Listing) -> Self {
        Self {
            id: value.id,
            owner_id: value.usuario_id,
            category_id: value.categoria_id,
            city_id: value.ciudad_id,
            commune_id: value.comuna_id,
            age: value.edad,
            title: value.titulo,
            description: value.descripcion,
            phone: value.telefono,
            whatsapp: value.whatsapp,
            email: value.correo_electronico,
            is_active: value.activo,
            is_top: value.top,
            created_at: value.fecha_creacion,
            updated_at: value.fecha_actualizacion,
        }
    }
}

impl<'a> From<&'a DomainNewListing> for NewListing<'a> {
    fn from(value: &'a DomainNewListing) -> Self {
        let details = &value.details;
        Self {
            usuario_id: value.owner_id,
            categoria_id: details.category_id,
            ciudad_id: details.city_id,
            comuna_id: details.commune_id,
            edad: details.age,
            titulo: details.title.as_str(),
            descripcion: details.description.as_str(),
            telefono: details.phone.as_str(),
            whatsapp: details.whatsapp,
            correo_electronico: details.email.as_str(),
        }
    }
}

impl<'a> From<&'a DomainUpdateListing> for UpdateListing<'a> {
    fn from(value: &'a DomainUpdateListing) -> Self {
        let details = &value.details;
        Self {
            categoria_id: details.category_id,
            ciudad_id: details.city_id,
            comuna_id: details.commune_id,
            edad: details.age,
            titulo: details.title.as_str(),
            descripcion: details.description.as_str(),
            telefono: details.phone.as_str(),
            whatsapp: details.whatsapp,
            correo_electronico: details.email.as_str(),
            fecha_actualizacion: value.updated_at,
        }
    }
}
