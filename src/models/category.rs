use diesel::prelude::*;

use crate::domain::category::Category as DomainCategory;

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::categorias)]
pub struct Category {
    pub id: i32,
    pub nombre: String,
}

impl From<Category> for DomainCategory {
    fn from(value: Category) -> Self {
        Self {
            id: value.id,
            name: value.nombre,
        }
    }
}
