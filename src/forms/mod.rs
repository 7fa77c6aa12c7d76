use std::str::FromStr;

use serde::{Deserialize, Deserializer};

pub mod listings;

/// Deserialize an optional number from a query string, treating blank or
/// unparseable values as absent.
pub fn lenient_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|raw| raw.trim().parse::<T>().ok()))
}

/// Deserialize an optional string, mapping blank input to `None`.
pub fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty()))
}
