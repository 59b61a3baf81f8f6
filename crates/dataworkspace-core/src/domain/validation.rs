//! Field-level validators shared by the domain entities

use lazy_static::lazy_static;
use regex::Regex;

use crate::CoreError;

lazy_static! {
    // Template names are used in URLs
    static ref TEMPLATE_NAME_REGEX: Regex = Regex::new(r"^[a-z]+$").unwrap();

    static ref DATASET_FIELD_NAME_REGEX: Regex = Regex::new(r"^[a-z][a-z0-9_.]*$").unwrap();
}

/// Whether `name` is a valid application template name: lowercase letters only
pub fn is_valid_template_name(name: &str) -> bool {
    TEMPLATE_NAME_REGEX.is_match(name)
}

/// Whether `name` is a valid reference dataset field name.
///
/// Must start with a lowercase letter and may only contain lowercase
/// letters, digits, underscores and dots.
pub fn is_valid_dataset_field_name(name: &str) -> bool {
    DATASET_FIELD_NAME_REGEX.is_match(name)
}

/// Reject `value` when it is longer than `max` characters
pub fn check_max_length(field: &str, value: &str, max: usize) -> Result<(), CoreError> {
    let len = value.chars().count();
    if len > max {
        return Err(CoreError::ValidationError(format!(
            "{} must be at most {} characters (got {})",
            field, max, len
        )));
    }
    Ok(())
}

/// Reject an empty or whitespace-only `value`
pub fn check_not_blank(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::ValidationError(format!("{} must not be blank", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_name_pattern() {
        assert!(is_valid_template_name("jupyterlab"));
        assert!(!is_valid_template_name("JupyterLab"));
        assert!(!is_valid_template_name("rstudio2"));
        assert!(!is_valid_template_name(""));
    }

    #[test]
    fn test_dataset_field_name_pattern() {
        assert!(is_valid_dataset_field_name("abc_1.x"));
        assert!(is_valid_dataset_field_name("a"));
        assert!(!is_valid_dataset_field_name("1abc"));
        assert!(!is_valid_dataset_field_name("ABC"));
        assert!(!is_valid_dataset_field_name("_abc"));
        assert!(!is_valid_dataset_field_name("has space"));
        assert!(!is_valid_dataset_field_name(""));
    }

    #[test]
    fn test_check_max_length_counts_chars() {
        assert!(check_max_length("name", "abc", 3).is_ok());
        assert!(check_max_length("name", "éé", 2).is_ok());
        assert!(matches!(
            check_max_length("name", "abcd", 3),
            Err(CoreError::ValidationError(_))
        ));
    }

    #[test]
    fn test_check_not_blank() {
        assert!(check_not_blank("host_basename", "x").is_ok());
        assert!(check_not_blank("host_basename", "  ").is_err());
    }
}
