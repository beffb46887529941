//! Field-level validation errors for user submitted forms.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Collection of validation failures keyed by field name.
///
/// Each entry carries the message shown next to the offending field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormError {
	pub fields: BTreeMap<String, String>,
}

impl FormError {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records a failure for `field`, keeping the first message if one exists.
	pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
		self.fields.entry(field.into()).or_insert_with(|| message.into());
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	pub fn contains(&self, field: &str) -> bool {
		self.fields.contains_key(field)
	}

	/// Converts the collected failures into a result.
	pub fn into_result(self) -> Result<(), FormError> {
		if self.is_empty() {
			Ok(())
		} else {
			Err(self)
		}
	}

	/// Shorthand for a single-field error.
	pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
		let mut errors = Self::new();
		errors.add(field, message);
		errors
	}
}

impl fmt::Display for FormError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let parts: Vec<String> = self
			.fields
			.iter()
			.map(|(field, message)| format!("{}: {}", field, message))
			.collect();
		write!(f, "{}", parts.join("; "))
	}
}

impl std::error::Error for FormError {}

/// Returns true when the optional string is absent or only whitespace.
pub(crate) fn is_blank(value: Option<&str>) -> bool {
	value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_first_message_wins() {
		let mut errors = FormError::new();
		errors.add("email", "Email is required");
		errors.add("email", "Please enter a valid email address");
		assert_eq!(errors.fields["email"], "Email is required");
		assert!(errors.into_result().is_err());
	}

	#[test]
	fn test_display_joins_fields() {
		let mut errors = FormError::new();
		errors.add("b", "two");
		errors.add("a", "one");
		assert_eq!(errors.to_string(), "a: one; b: two");
	}
}
