use diesel::prelude::*;

use crate::domain::category::Category as DomainCategory;
use crate::models::category::Category as DbCategory;
use crate::repository::{CategoryReader, DieselRepository, RepositoryResult};

impl CategoryReader for DieselRepository {
    fn list_categories(&self) -> RepositoryResult<Vec<DomainCategory>> {
        use crate::schema::categorias;

        let mut conn = self.conn()?;
        let categories = categorias::table
            .order(categorias::nombre.asc())
            .load::<DbCategory>(&mut conn)?;

        Ok(categories.into_iter().map(DomainCategory::from).collect())
    }

    fn get_category_by_id(&self, id: i32) -> RepositoryResult<Option<DomainCategory>> {
        use crate::schema::categorias;

        let mut conn = self.conn()?;
        let category = categorias::table
            .filter(categorias::id.eq(id))
            .first::<DbCategory>(&mut conn)
            .optional()?;

        Ok(category.map(DomainCategory::from))
    }
}
