//! Collects per-field validation failures.
//!
//! The first message recorded for a field wins; later checks on the same
//! field are ignored so the client sees the most basic problem first.

use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_insert_with(|| message.into());
    }

    /// Records `message` for `field` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_error(field, message);
        }
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn into_errors(self) -> BTreeMap<String, String> {
        self.errors
    }
}

/// True when `value` is one of `permitted`.
pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}

/// True when the optional text is present and not blank.
pub fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_per_field_wins() {
        let mut v = Validator::new();
        v.check(false, "name", "must be provided");
        v.check(false, "name", "must not be more than 500 bytes long");
        v.check(true, "tlp", "must be provided");

        assert!(!v.valid());
        assert_eq!(v.errors().len(), 1);
        assert_eq!(v.errors()["name"], "must be provided");
    }

    #[test]
    fn test_present() {
        assert!(present(&Some("CHS001".to_string())));
        assert!(!present(&Some("   ".to_string())));
        assert!(!present(&None));
    }

    #[test]
    fn test_permitted_value() {
        assert!(permitted_value(&"-id", &["id", "-id"]));
        assert!(!permitted_value(&"rn", &["id", "-id"]));
    }
}
