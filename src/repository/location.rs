use diesel::prelude::*;

use crate::domain::location::{City as DomainCity, Commune as DomainCommune};
use crate::models::location::{City as DbCity, Commune as DbCommune};
use crate::repository::{DieselRepository, LocationReader, RepositoryResult};

impl LocationReader for DieselRepository {
    fn list_cities(&self) -> RepositoryResult<Vec<DomainCity>> {
        use crate::schema::ciudades;

        let mut conn = self.conn()?;
        let cities = ciudades::table
            .order(ciudades::nombre.asc())
            .load::<DbCity>(&mut conn)?;

        Ok(cities.into_iter().map(DomainCity::from).collect())
    }

    fn get_city_by_id(&self, id: i32) -> RepositoryResult<Option<DomainCity>> {
        use crate::schema::ciudades;

        let mut conn = self.conn()?;
        let city = ciudades::table
            .filter(ciudades::id.eq(id))
            .first::<DbCity>(&mut conn)
            .optional()?;

        Ok(city.map(DomainCity::from))
    }

    fn list_communes(&self, city_id: i32) -> RepositoryResult<Vec<DomainCommune>> {
        use crate::schema::comunas;

        let mut conn = self.conn()?;
        let communes = comunas::table
            .filter(comunas::ciudad_id.eq(city_id))
            .order(comunas::nombre.asc())
            .load::<DbCommune>(&mut conn)?;

        Ok(communes.into_iter().map(DomainCommune::from).collect())
    }

    fn get_commune_by_id(&self, id: i32) -> RepositoryResult<Option<DomainCommune>> {
        use crate::schema::comunas;

        let mut conn = self.conn()?;
        let commune = comunas::table
            .filter(comunas::id.eq(id))
            .first::<DbCommune>(&mut conn)
            .optional()?;

        Ok(commune.map(DomainCommune::from))
    }
}
