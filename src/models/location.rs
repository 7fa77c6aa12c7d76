use diesel::prelude::*;

use crate::domain::location::{City as DomainCity, Commune as DomainCommune};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::ciudades)]
pub struct City {
    pub id: i32,
    pub nombre: String,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::comunas)]
pub struct Commune {
    pub id: i32,
    pub ciudad_id: i32,
    pub nombre: String,
}

impl From<City> for DomainCity {
    fn from(value: City) -> Self {
        Self {
            id: value.id,
            name: value.nombre,
        }
    }
}

impl From<Commune> for DomainCommune {
    fn from(value: Commune) -> Self {
        Self {
            id: value.id,
            city_id: value.ciudad_id,
            name: value.nombre,
        }
    }
}
