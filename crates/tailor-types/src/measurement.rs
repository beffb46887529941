//! Body measurement records.
//!
//! One record exists per username. Values are in inches; each field is
//! optional but the core fields needed to cut a garment must be present
//! when a record is first created.

use crate::form::FormError;
use serde::{Deserialize, Serialize};

/// Fields that must be filled in when a record is created.
pub const REQUIRED_MEASUREMENTS: [&str; 5] = ["neck", "chest", "waist", "hip", "shoulder"];

/// Measurement record of a single client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
	#[serde(default)]
	pub username: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub neck: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub chest: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub waist: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hip: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub shoulder: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sleeve: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub armhole: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub bicep: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub wrist: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub inseam: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub outseam: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub thigh: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rise: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub bodylength: Option<f64>,
}

impl Measurement {
	/// Field names paired with their values, in form order.
	pub fn values(&self) -> [(&'static str, Option<f64>); 14] {
		[
			("neck", self.neck),
			("chest", self.chest),
			("waist", self.waist),
			("hip", self.hip),
			("shoulder", self.shoulder),
			("sleeve", self.sleeve),
			("armhole", self.armhole),
			("bicep", self.bicep),
			("wrist", self.wrist),
			("inseam", self.inseam),
			("outseam", self.outseam),
			("thigh", self.thigh),
			("rise", self.rise),
			("bodylength", self.bodylength),
		]
	}

	/// Checks every present value is a finite positive number.
	pub fn validate(&self) -> Result<(), FormError> {
		let mut errors = FormError::new();
		for (field, value) in self.values() {
			if let Some(v) = value {
				if !v.is_finite() || v <= 0.0 {
					errors.add(field, format!("{} must be a positive number", capitalize(field)));
				}
			}
		}
		errors.into_result()
	}

	/// Validation applied when a record is first created.
	pub fn validate_new(&self) -> Result<(), FormError> {
		let mut errors = FormError::new();
		for (field, value) in self.values() {
			if value.is_none() && REQUIRED_MEASUREMENTS.contains(&field) {
				errors.add(field, format!("{} is required", capitalize(field)));
			}
		}
		if let Err(positive) = self.validate() {
			for (field, message) in positive.fields {
				errors.add(field, message);
			}
		}
		errors.into_result()
	}

	/// Overwrites fields that are present in `other`.
	pub fn merge(&mut self, other: &Measurement) {
		macro_rules! take {
			($($field:ident),*) => {
				$(if other.$field.is_some() { self.$field = other.$field; })*
			};
		}
		take!(
			neck, chest, waist, hip, shoulder, sleeve, armhole, bicep, wrist, inseam, outseam,
			thigh, rise, bodylength
		);
	}
}

fn capitalize(field: &str) -> String {
	let mut chars = field.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn core_fields() -> Measurement {
		Measurement {
			username: "ada".to_string(),
			neck: Some(15.5),
			chest: Some(38.0),
			waist: Some(32.0),
			hip: Some(40.0),
			shoulder: Some(18.0),
			..Measurement::default()
		}
	}

	#[test]
	fn test_new_record_requires_core_fields() {
		let err = Measurement {
			username: "ada".to_string(),
			chest: Some(38.0),
			..Measurement::default()
		}
		.validate_new()
		.unwrap_err();
		assert_eq!(err.fields["neck"], "Neck is required");
		assert!(!err.contains("chest"));
		assert!(!err.contains("sleeve"));
		assert!(core_fields().validate_new().is_ok());
	}

	#[test]
	fn test_rejects_non_positive_values() {
		let err = Measurement {
			sleeve: Some(0.0),
			rise: Some(f64::NAN),
			..core_fields()
		}
		.validate()
		.unwrap_err();
		assert_eq!(err.fields["sleeve"], "Sleeve must be a positive number");
		assert!(err.contains("rise"));
	}

	#[test]
	fn test_merge_keeps_absent_fields() {
		let mut record = core_fields();
		record.merge(&Measurement {
			chest: Some(39.0),
			inseam: Some(31.0),
			..Measurement::default()
		});
		assert_eq!(record.chest, Some(39.0));
		assert_eq!(record.neck, Some(15.5));
		assert_eq!(record.inseam, Some(31.0));
	}
}
