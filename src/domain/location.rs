use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct City {
    pub id: i32,
    pub name: String,
}

/// Sub-division of a city. Only valid together with its parent city.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Commune {
    pub id: i32,
    pub city_id: i32,
    pub name: String,
}

impl Commune {
    /// Whether this commune lies in the city `city_id`.
    pub fn belongs_to(&self, city_id: i32) -> bool {
        self.city_id == city_id
    }
}
