//! Request validation: the orchestration layer that drives parameter and
//! body checking for one operation.
//!
//! Resolves Open Question 1 from the expanded spec: this validator is
//! constructed with a `&SchemaRegistry`, never a bare strictness enum. The
//! mode never changes what gets reported here -- every issue is always
//! collected -- it only changes what the dispatcher does with the result.

pub mod body;
pub mod form;
pub mod params;
pub mod schema;

use std::collections::HashMap;

use openapiv3::{Operation, Parameter, ParameterSchemaOrContent, ReferenceOr};
use serde_json::Value;

use crate::diagnostics::ValidationIssue;
use crate::registry::SchemaRegistry;
use crate::validator::form::FormFormat;
use crate::validator::params::{coerce, parse_cookies, split_simple_header_array, ArrayFormat, ObjectFormat, QueryParams};
use crate::validator::schema::{OneOfMode, SchemaValidator};

pub struct ValidatorConfig {
	pub query_array_format: ArrayFormat,
	pub query_object_format: ObjectFormat,
	pub form_format: FormFormat,
	pub one_of_mode: OneOfMode,
}

impl Default for ValidatorConfig {
	fn default() -> Self {
		ValidatorConfig {
			query_array_format: ArrayFormat::Repeat,
			query_object_format: ObjectFormat::Flat,
			form_format: FormFormat::Dots,
			one_of_mode: OneOfMode::AnyMatch,
		}
	}
}

pub struct RequestParts<'a> {
	pub path_params: &'a HashMap<String, String>,
	pub raw_query: &'a str,
	pub headers: &'a HashMap<String, String>,
	pub body: Option<&'a [u8]>,
	pub content_type: Option<&'a str>,
}

pub struct ValidationOutcome {
	pub issues: Vec<ValidationIssue>,
	pub body_value: Option<Value>,
}

pub struct RequestValidator<'a> {
	registry: &'a SchemaRegistry,
	config: &'a ValidatorConfig,
}

impl<'a> RequestValidator<'a> {
	pub fn new(registry: &'a SchemaRegistry, config: &'a ValidatorConfig) -> Self {
		RequestValidator { registry, config }
	}

	pub fn validate(&self, operation: &Operation, parts: &RequestParts<'_>) -> ValidationOutcome {
		let schema_validator = SchemaValidator::new(self.registry, self.config.one_of_mode);
		let mut issues = Vec::new();
		let query = QueryParams::parse(parts.raw_query);
		let mut declared_query_names = Vec::new();

		for param_ref in &operation.parameters {
			let Some(param) = self.resolve_parameter(param_ref) else { continue };
			self.validate_parameter(param, parts, &query, &schema_validator, &mut issues, &mut declared_query_names);
		}

		self.check_unknown_query_params(&query, &declared_query_names, &mut issues);

		let body_value = self.validate_body(operation, parts, &schema_validator, &mut issues);

		ValidationOutcome { issues, body_value }
	}

	fn resolve_parameter<'p>(&self, param_ref: &'p ReferenceOr<Parameter>) -> Option<&'p Parameter> {
		match param_ref {
			ReferenceOr::Item(p) => Some(p),
			ReferenceOr::Reference { .. } => None, // component parameters resolved via raw doc elsewhere if needed
		}
	}

	fn validate_parameter(
		&self,
		param: &Parameter,
		parts: &RequestParts<'_>,
		query: &QueryParams,
		validator: &SchemaValidator<'_>,
		issues: &mut Vec<ValidationIssue>,
		declared_query_names: &mut Vec<String>,
	) {
		let data = param.parameter_data_ref();
		let schema = match &data.format {
			ParameterSchemaOrContent::Schema(ReferenceOr::Item(s)) => serde_json::to_value(s).unwrap_or(Value::Null),
			ParameterSchemaOrContent::Schema(ReferenceOr::Reference { reference }) => {
				self.registry.resolve_ref(reference).cloned().unwrap_or(Value::Null)
			},
			ParameterSchemaOrContent::Content(_) => Value::Null,
		};
		let is_array = schema.get("type").and_then(Value::as_str) == Some("array");

		match param {
			Parameter::Query { .. } => {
				declared_query_names.push(data.name.clone());
				self.validate_query_param(&data.name, data.required, &schema, is_array, query, validator, issues);
			},
			Parameter::Path { .. } => {
				let path = format!("path.{}", data.name);
				match parts.path_params.get(&data.name) {
					Some(raw) => {
						let coerced = coerce(raw, &schema);
						issues.extend(validator.validate(&coerced, &schema, &path));
					},
					None if data.required => {
						issues.push(ValidationIssue::new(&path, format!("missing required path parameter '{}'", data.name)));
					},
					None => {},
				}
			},
			Parameter::Header { .. } => {
				let path = format!("header.{}", data.name);
				let found = parts
					.headers
					.iter()
					.find(|(k, _)| k.eq_ignore_ascii_case(&data.name))
					.map(|(_, v)| v.as_str());
				match found {
					Some(raw) => {
						let value = if is_array {
							Value::Array(split_simple_header_array(raw).into_iter().map(Value::String).collect())
						} else {
							coerce(raw, &schema)
						};
						issues.extend(validator.validate(&value, &schema, &path));
					},
					None if data.required => {
						issues.push(ValidationIssue::new(&path, format!("missing required header '{}'", data.name)));
					},
					None => {},
				}
			},
			Parameter::Cookie { .. } => {
				let path = format!("cookie.{}", data.name);
				let cookies = parts
					.headers
					.iter()
					.find(|(k, _)| k.eq_ignore_ascii_case("cookie"))
					.map(|(_, v)| parse_cookies(v))
					.unwrap_or_default();
				match cookies.get(&data.name) {
					Some(raw) => {
						let coerced = coerce(raw, &schema);
						issues.extend(validator.validate(&coerced, &schema, &path));
					},
					None if data.required => {
						issues.push(ValidationIssue::new(&path, format!("missing required cookie '{}'", data.name)));
					},
					None => {},
				}
			},
		}
	}

	fn validate_query_param(
		&self,
		name: &str,
		required: bool,
		schema: &Value,
		is_array: bool,
		query: &QueryParams,
		validator: &SchemaValidator<'_>,
		issues: &mut Vec<ValidationIssue>,
	) {
		let path = format!("query.{name}");
		if is_array {
			match query.array(name, self.config.query_array_format) {
				Some(values) => {
					let coerced: Vec<Value> = values.iter().map(|v| coerce(v, schema.get("items").unwrap_or(&Value::Null))).collect();
					issues.extend(validator.validate(&Value::Array(coerced), schema, &path));
				},
				None if required => issues.push(ValidationIssue::new(&path, format!("missing required query parameter '{name}'"))),
				None => {},
			}
			return;
		}
		if schema.get("type").and_then(Value::as_str) == Some("object") {
			match query.object(name, self.config.query_object_format) {
				Some(obj) => issues.extend(validator.validate(&Value::Object(obj), schema, &path)),
				None if required => issues.push(ValidationIssue::new(&path, format!("missing required query parameter '{name}'"))),
				None => {},
			}
			return;
		}
		match query.scalar(name) {
			Some(raw) => {
				let coerced = coerce(raw, schema);
				issues.extend(validator.validate(&coerced, schema, &path));
			},
			None if required => issues.push(ValidationIssue::new(&path, format!("missing required query parameter '{name}'"))),
			None => {},
		}
	}

	fn check_unknown_query_params(&self, query: &QueryParams, declared: &[String], issues: &mut Vec<ValidationIssue>) {
		for name in query.known_names() {
			let base_name = name.split(['[', '.']).next().unwrap_or(name);
			if !declared.iter().any(|d| d == base_name) {
				issues.push(ValidationIssue::new(format!("query.{name}"), format!("unknown query parameter '{name}'")));
			}
		}
	}

	fn validate_body(
		&self,
		operation: &Operation,
		parts: &RequestParts<'_>,
		validator: &SchemaValidator<'_>,
		issues: &mut Vec<ValidationIssue>,
	) -> Option<Value> {
		let request_body = match &operation.request_body {
			Some(ReferenceOr::Item(rb)) => rb,
			Some(ReferenceOr::Reference { .. }) | None => return None,
		};

		let declared_length = parts
			.headers
			.iter()
			.find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
			.map(|(_, v)| v.as_str());
		if let Err(issue) = body::check_content_length(declared_length) {
			issues.push(issue);
			return None;
		}

		let Some(raw_bytes) = parts.body else {
			if request_body.required {
				issues.push(ValidationIssue::new("body", "request body is required"));
			}
			return None;
		};

		if let Err(issue) = body::check_body_size(raw_bytes.len()) {
			issues.push(issue);
			return None;
		}

		let declared_types: Vec<String> = request_body.content.keys().cloned().collect();
		if body::is_unsupported_media_type(parts.content_type, &declared_types) {
			issues.push(ValidationIssue::new("body", "unsupported or missing Content-Type for this operation"));
			return None;
		}

		let media_type = parts.content_type.map(|c| c.split(';').next().unwrap_or(c).trim()).unwrap();
		let media_entry = request_body.content.get(media_type)?;

		let value = match body::parse_body(raw_bytes, parts.content_type, self.config.form_format) {
			Ok(v) => v,
			Err(issue) => {
				issues.push(issue);
				return None;
			},
		};

		if let Some(ReferenceOr::Item(schema)) = &media_entry.schema {
			let schema_value = serde_json::to_value(schema).unwrap_or(Value::Null);
			issues.extend(body::validate_body(&value, &schema_value, validator));
		} else if let Some(ReferenceOr::Reference { reference }) = &media_entry.schema {
			if let Some(schema_value) = self.registry.resolve_ref(reference) {
				issues.extend(body::validate_body(&value, schema_value, validator));
			}
		}

		Some(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use crate::refgraph::RefGraph;
	use serde_json::json;

	fn op_with_required_body() -> Operation {
		let raw = json!({
			"responses": {},
			"requestBody": {
				"required": true,
				"content": {"application/json": {"schema": {"type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}}}},
			},
		});
		serde_json::from_value(raw).unwrap()
	}

	#[test]
	fn missing_required_body_is_reported() {
		let doc = json!({});
		let graph = RefGraph::build(&doc);
		let registry = SchemaRegistry::new(Arc::new(doc.clone()), Arc::new(graph.clone()));
		let config = ValidatorConfig::default();
		let validator = RequestValidator::new(&registry, &config);
		let op = op_with_required_body();
		let parts = RequestParts {
			path_params: &HashMap::new(),
			raw_query: "",
			headers: &HashMap::new(),
			body: None,
			content_type: None,
		};
		let outcome = validator.validate(&op, &parts);
		assert!(outcome.issues.iter().any(|i| i.path == "body"));
	}

	#[test]
	fn valid_body_produces_no_issues() {
		let doc = json!({});
		let graph = RefGraph::build(&doc);
		let registry = SchemaRegistry::new(Arc::new(doc.clone()), Arc::new(graph.clone()));
		let config = ValidatorConfig::default();
		let validator = RequestValidator::new(&registry, &config);
		let op = op_with_required_body();
		let body_bytes = serde_json::to_vec(&json!({"name": "Alice"})).unwrap();
		let parts = RequestParts {
			path_params: &HashMap::new(),
			raw_query: "",
			headers: &HashMap::new(),
			body: Some(&body_bytes),
			content_type: Some("application/json"),
		};
		let outcome = validator.validate(&op, &parts);
		assert!(outcome.issues.is_empty());
		assert_eq!(outcome.body_value, Some(json!({"name": "Alice"})));
	}

	#[test]
	fn unknown_query_param_is_reported() {
		let raw = json!({"responses": {}, "parameters": [
			{"name": "limit", "in": "query", "required": false, "schema": {"type": "integer"}},
		]});
		let op: Operation = serde_json::from_value(raw).unwrap();
		let doc = json!({});
		let graph = RefGraph::build(&doc);
		let registry = SchemaRegistry::new(Arc::new(doc.clone()), Arc::new(graph.clone()));
		let config = ValidatorConfig::default();
		let validator = RequestValidator::new(&registry, &config);
		let parts = RequestParts {
			path_params: &HashMap::new(),
			raw_query: "limit=10&unknown=1",
			headers: &HashMap::new(),
			body: None,
			content_type: None,
		};
		let outcome = validator.validate(&op, &parts);
		assert!(outcome.issues.iter().any(|i| i.path == "query.unknown"));
	}
}
