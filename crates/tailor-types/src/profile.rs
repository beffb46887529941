//! Client and administrator profiles.

use crate::form::{is_blank, FormError};
use crate::lifecycle::Role;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_PATTERN: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

static PHONE_PATTERN: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[0-9+\-\s()]{10,}$").expect("valid phone pattern"));

static USERNAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^[A-Za-z0-9_@+-][A-Za-z0-9._@+-]{0,63}$").expect("valid username pattern")
});

/// Whether `username` can name a profile. Usernames also key the stored
/// profile and measurement records, so a leading dot is refused.
pub fn is_valid_username(username: &str) -> bool {
	USERNAME_PATTERN.is_match(username)
}

/// Stored profile of a shop user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
	/// Stable identifier used by orders and measurements.
	pub username: String,
	pub firstname: String,
	pub lastname: String,
	pub email: String,
	pub phonenumber: String,
	pub role: Role,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub gender: Option<String>,
	/// Fixed at registration.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub birthdate: Option<NaiveDate>,
	#[serde(default)]
	pub bio: String,
}

impl Profile {
	pub fn full_name(&self) -> String {
		format!("{} {}", self.firstname, self.lastname)
	}

	pub fn is_client(&self) -> bool {
		self.role == Role::Client
	}
}

/// Registration payload submitted by an administrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProfile {
	#[serde(default)]
	pub username: String,
	#[serde(default)]
	pub firstname: String,
	#[serde(default)]
	pub lastname: String,
	#[serde(default)]
	pub email: String,
	#[serde(default)]
	pub phonenumber: String,
	#[serde(default)]
	pub role: Option<Role>,
	#[serde(default)]
	pub gender: Option<String>,
	#[serde(default)]
	pub birthdate: Option<NaiveDate>,
	#[serde(default)]
	pub bio: Option<String>,
}

impl NewProfile {
	/// Validates the payload and builds the stored profile.
	///
	/// The role defaults to `client`.
	pub fn into_profile(self) -> Result<Profile, FormError> {
		let mut errors = FormError::new();
		if self.username.trim().is_empty() {
			errors.add("username", "Username is required");
		} else if !is_valid_username(self.username.trim()) {
			errors.add(
				"username",
				"Username may only contain letters, digits and . _ @ + - and cannot start with a dot",
			);
		}
		check_contact(
			&mut errors,
			true,
			Some(self.firstname.as_str()),
			Some(self.lastname.as_str()),
			Some(self.email.as_str()),
			Some(self.phonenumber.as_str()),
		);
		errors.into_result()?;

		Ok(Profile {
			username: self.username.trim().to_string(),
			firstname: self.firstname.trim().to_string(),
			lastname: self.lastname.trim().to_string(),
			email: self.email.trim().to_string(),
			phonenumber: self.phonenumber.trim().to_string(),
			role: self.role.unwrap_or(Role::Client),
			gender: self.gender.filter(|g| !g.trim().is_empty()),
			birthdate: self.birthdate,
			bio: self.bio.unwrap_or_default(),
		})
	}
}

/// Mutable subset of a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub firstname: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub lastname: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub phonenumber: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub bio: Option<String>,
}

impl ProfileUpdate {
	/// Checks the fields that are present.
	pub fn validate(&self) -> Result<(), FormError> {
		let mut errors = FormError::new();
		check_contact(
			&mut errors,
			false,
			self.firstname.as_deref(),
			self.lastname.as_deref(),
			self.email.as_deref(),
			self.phonenumber.as_deref(),
		);
		errors.into_result()
	}

	pub fn apply(&self, profile: &mut Profile) {
		if let Some(v) = &self.firstname {
			profile.firstname = v.trim().to_string();
		}
		if let Some(v) = &self.lastname {
			profile.lastname = v.trim().to_string();
		}
		if let Some(v) = &self.email {
			profile.email = v.trim().to_string();
		}
		if let Some(v) = &self.phonenumber {
			profile.phonenumber = v.trim().to_string();
		}
		if let Some(v) = &self.bio {
			profile.bio = v.clone();
		}
	}
}

/// Checks contact fields. `None` means "not submitted" and is only an
/// error when `required` is set.
fn check_contact(
	errors: &mut FormError,
	required: bool,
	firstname: Option<&str>,
	lastname: Option<&str>,
	email: Option<&str>,
	phone: Option<&str>,
) {
	let submitted = |v: Option<&str>| required || v.is_some();

	if submitted(firstname) && is_blank(firstname) {
		errors.add("firstname", "First name is required");
	}
	if submitted(lastname) && is_blank(lastname) {
		errors.add("lastname", "Last name is required");
	}
	if submitted(email) {
		match email.map(str::trim) {
			Some(e) if !e.is_empty() => {
				if !EMAIL_PATTERN.is_match(e) {
					errors.add("email", "Please enter a valid email address");
				}
			},
			_ => errors.add("email", "Email is required"),
		}
	}
	if submitted(phone) {
		match phone.map(str::trim) {
			Some(p) if !p.is_empty() => {
				if !PHONE_PATTERN.is_match(p) {
					errors.add("phonenumber", "Please enter a valid phone number");
				}
			},
			_ => errors.add("phonenumber", "Phone number is required"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn registration() -> NewProfile {
		NewProfile {
			username: "ada".to_string(),
			firstname: "Ada".to_string(),
			lastname: "Lovelace".to_string(),
			email: "ada@example.com".to_string(),
			phonenumber: "+1 (555) 010-0000".to_string(),
			..NewProfile::default()
		}
	}

	#[test]
	fn test_registration_defaults_to_client() {
		let profile = registration().into_profile().unwrap();
		assert_eq!(profile.role, Role::Client);
		assert_eq!(profile.full_name(), "Ada Lovelace");
	}

	#[test]
	fn test_registration_rejects_bad_contact() {
		let err = NewProfile {
			email: "ada@example".to_string(),
			phonenumber: "12345".to_string(),
			firstname: " ".to_string(),
			..registration()
		}
		.into_profile()
		.unwrap_err();
		assert_eq!(err.fields["email"], "Please enter a valid email address");
		assert_eq!(err.fields["phonenumber"], "Please enter a valid phone number");
		assert_eq!(err.fields["firstname"], "First name is required");
	}

	#[test]
	fn test_username_charset() {
		let err = NewProfile {
			username: "ada/../root".to_string(),
			..registration()
		}
		.into_profile()
		.unwrap_err();
		assert!(err.contains("username"));

		assert!(is_valid_username("ada.lovelace@shop"));
		assert!(!is_valid_username(".ada"));
		assert!(!is_valid_username("ada lovelace"));
		assert!(!is_valid_username(&"a".repeat(65)));
	}

	#[test]
	fn test_update_only_checks_present_fields() {
		assert!(ProfileUpdate {
			bio: Some("Prefers slim fits".to_string()),
			..ProfileUpdate::default()
		}
		.validate()
		.is_ok());

		let err = ProfileUpdate {
			lastname: Some(String::new()),
			..ProfileUpdate::default()
		}
		.validate()
		.unwrap_err();
		assert!(err.contains("lastname"));
		assert_eq!(err.fields.len(), 1);
	}
}
