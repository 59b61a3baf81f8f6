//! Reference dataset fields and their name format

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::identifiers::{DatasetFieldId, ReferenceDatasetId};
use super::validation::{check_max_length, is_valid_dataset_field_name};
use crate::CoreError;

/// Maximum length of a field name
pub const MAX_FIELD_NAME_LENGTH: usize = 60;

/// Help text shown next to the field name input
pub const FIELD_NAME_HELP_TEXT: &str = "Field name must start with a letter and may only contain \
     lowercase letters, numbers and underscores (no spaces)";

/// A validated reference dataset field name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetFieldName(String);

impl DatasetFieldName {
    /// Validate and wrap `name`
    pub fn parse(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if !is_valid_dataset_field_name(&name) {
            return Err(CoreError::ValidationError(format!(
                "Name must start with a character and contain only lowercase letters, numbers and underscores: '{}'",
                name
            )));
        }
        check_max_length("name", &name, MAX_FIELD_NAME_LENGTH)?;
        Ok(Self(name))
    }

    /// The name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetFieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DatasetFieldName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DatasetFieldName {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DatasetFieldName> for String {
    fn from(name: DatasetFieldName) -> Self {
        name.0
    }
}

/// A column of a reference dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDatasetField {
    /// Unique identifier
    pub id: DatasetFieldId,
    /// Dataset the field belongs to
    pub reference_dataset: ReferenceDatasetId,
    /// Column name
    pub name: DatasetFieldName,
    /// Human readable description
    pub description: Option<String>,
}

impl ReferenceDatasetField {
    /// Create a field with a validated name
    pub fn new(reference_dataset: ReferenceDatasetId, name: &str) -> Result<Self, CoreError> {
        Ok(Self {
            id: DatasetFieldId::new_v4(),
            reference_dataset,
            name: DatasetFieldName::parse(name)?,
            description: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_name_parse() {
        assert_eq!(DatasetFieldName::parse("abc_1.x").unwrap().as_str(), "abc_1.x");
        assert!(DatasetFieldName::parse("1abc").is_err());
        assert!(DatasetFieldName::parse("ABC").is_err());
        assert!(DatasetFieldName::parse("a".repeat(61)).is_err());
    }

    #[test]
    fn test_field_name_deserialization_validates() {
        let ok: DatasetFieldName = serde_json::from_str("\"country_code\"").unwrap();
        assert_eq!(ok.to_string(), "country_code");
        assert!(serde_json::from_str::<DatasetFieldName>("\"Country\"").is_err());
    }
}
