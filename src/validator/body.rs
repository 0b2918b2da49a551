//! Request body extraction: content-length/size limits, media-type
//! dispatch, and handing the parsed value to the schema validator.

use serde_json::Value;

use crate::diagnostics::ValidationIssue;
use crate::validator::form::{self, FormFormat};
use crate::validator::schema::SchemaValidator;

pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

pub struct BodyCheckResult {
	pub value: Option<Value>,
	pub issues: Vec<ValidationIssue>,
}

/// Validates a declared `Content-Length` against the hard cap before any
/// bytes are read; malformed or oversized lengths short-circuit immediately.
pub fn check_content_length(declared: Option<&str>) -> Result<(), ValidationIssue> {
	let Some(raw) = declared else { return Ok(()) };
	match raw.parse::<u64>() {
		Ok(len) if len > MAX_BODY_BYTES => Err(ValidationIssue::new(
			"body",
			format!("declared Content-Length {len} exceeds the {MAX_BODY_BYTES} byte limit"),
		)),
		Ok(_) => Ok(()),
		Err(_) => Err(ValidationIssue::new("body", format!("malformed Content-Length header: '{raw}'"))),
	}
}

/// Checked after the body is actually read, in case the client never sent
/// (or lied about) `Content-Length`.
pub fn check_body_size(actual_len: usize) -> Result<(), ValidationIssue> {
	if actual_len as u64 > MAX_BODY_BYTES {
		Err(ValidationIssue::new(
			"body",
			format!("body of {actual_len} bytes exceeds the {MAX_BODY_BYTES} byte limit"),
		))
	} else {
		Ok(())
	}
}

fn strip_media_type_params(content_type: &str) -> &str {
	content_type.split(';').next().unwrap_or(content_type).trim()
}

/// Parses `bytes` according to `content_type`, returning the resulting
/// JSON-compatible value. Unknown media types pass through as a raw string
/// so the caller can still decide what to do.
pub fn parse_body(
	bytes: &[u8],
	content_type: Option<&str>,
	form_format: FormFormat,
) -> Result<Value, ValidationIssue> {
	let media_type = content_type.map(strip_media_type_params).unwrap_or("application/octet-stream");

	if media_type == "application/json" || media_type.ends_with("+json") {
		serde_json::from_slice(bytes).map_err(|e| ValidationIssue::new("body", format!("invalid JSON body: {e}")))
	} else if media_type == "application/x-www-form-urlencoded" {
		Ok(form::parse_urlencoded(bytes, form_format).data)
	} else {
		Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
	}
}

pub fn validate_body(
	value: &Value,
	schema: &Value,
	validator: &SchemaValidator<'_>,
) -> Vec<ValidationIssue> {
	validator.validate(value, schema, "body")
}

pub fn is_unsupported_media_type(content_type: Option<&str>, declared_types: &[String]) -> bool {
	let Some(content_type) = content_type else { return true };
	let media_type = strip_media_type_params(content_type);
	!declared_types.iter().any(|t| t == media_type)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn content_length_exactly_at_cap_is_accepted() {
		assert!(check_content_length(Some(&MAX_BODY_BYTES.to_string())).is_ok());
	}

	#[test]
	fn content_length_one_over_cap_is_rejected() {
		let over = (MAX_BODY_BYTES + 1).to_string();
		assert!(check_content_length(Some(&over)).is_err());
	}

	#[test]
	fn malformed_content_length_is_rejected() {
		assert!(check_content_length(Some("not-a-number")).is_err());
	}

	#[test]
	fn parses_json_media_type_and_suffix_variant() {
		let value = parse_body(b"{\"a\":1}", Some("application/json"), FormFormat::Dots).unwrap();
		assert_eq!(value, serde_json::json!({"a": 1}));
		let value2 = parse_body(b"{\"a\":1}", Some("application/vnd.api+json"), FormFormat::Dots).unwrap();
		assert_eq!(value2, serde_json::json!({"a": 1}));
	}

	#[test]
	fn unknown_media_type_is_unsupported_when_not_declared() {
		assert!(is_unsupported_media_type(Some("text/csv"), &["application/json".to_string()]));
		assert!(!is_unsupported_media_type(Some("application/json"), &["application/json".to_string()]));
	}
}
