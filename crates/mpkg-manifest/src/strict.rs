//! Type-strict string fields.
//!
//! YAML and plist deserializers happily coerce `version: 1.0` into the string
//! `"1.0"` when asked for a `String`. Required text fields go through
//! `deserialize_any` instead so only genuine string scalars are accepted.

use serde::de::{self, Deserializer, Visitor};
use std::fmt;

struct StrictStringVisitor;

impl<'de> Visitor<'de> for StrictStringVisitor {
    type Value = String;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a string")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(value.to_owned())
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(value)
    }
}

pub(crate) fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(StrictStringVisitor)
}
