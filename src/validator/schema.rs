//! A hand-rolled JSON-Schema 2020-12 subset validator.
//!
//! No `jsonschema`-style crate appears anywhere in the corpus this crate was
//! built from, which follows the same idiom as the teacher's own hand
//! written `resolve_schema`/`resolve_nested_schema` resolution functions:
//! this domain resolves and checks schemas by hand rather than reaching for
//! an off-the-shelf validation library.

use std::collections::HashSet;

use serde_json::Value;

use crate::diagnostics::ValidationIssue;
use crate::pointer::Pointer;
use crate::registry::SchemaRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneOfMode {
	AnyMatch,
	ExactlyOne,
}

pub struct SchemaValidator<'a> {
	registry: &'a SchemaRegistry,
	one_of_mode: OneOfMode,
}

impl<'a> SchemaValidator<'a> {
	pub fn new(registry: &'a SchemaRegistry, one_of_mode: OneOfMode) -> Self {
		SchemaValidator { registry, one_of_mode }
	}

	pub fn validate(&self, instance: &Value, schema: &Value, path: &str) -> Vec<ValidationIssue> {
		let mut issues = Vec::new();
		let mut visited = HashSet::new();
		self.check(instance, schema, path, &mut visited, &mut issues);
		issues
	}

	fn resolve<'b>(&self, schema: &'b Value) -> Option<std::borrow::Cow<'b, Value>> {
		if let Some(Value::String(raw_ref)) = schema.get("$ref") {
			self
				.registry
				.resolve_ref(raw_ref)
				.map(|v| std::borrow::Cow::Owned(v.clone()))
		} else {
			Some(std::borrow::Cow::Borrowed(schema))
		}
	}

	fn check(
		&self,
		instance: &Value,
		schema: &Value,
		path: &str,
		visited: &mut HashSet<Pointer>,
		issues: &mut Vec<ValidationIssue>,
	) {
		if let Value::Bool(allowed) = schema {
			if !allowed {
				issues.push(ValidationIssue::new(path, "value is not allowed by a `false` schema"));
			}
			return;
		}

		if let Some(Value::String(raw_ref)) = schema.get("$ref") {
			let pointer = match Pointer::parse(raw_ref) {
				Ok(p) => p,
				Err(_) => {
					issues.push(ValidationIssue::new(path, format!("malformed reference '{raw_ref}'")));
					return;
				},
			};
			// A revisit along the current path terminates recursion: the
			// cyclic branch is treated as satisfied rather than re-checked.
			if !visited.insert(pointer.clone()) {
				return;
			}
			let resolved = match self.registry.resolve(&pointer) {
				Some(v) => v.clone(),
				None => {
					issues.push(ValidationIssue::new(path, format!("reference '{raw_ref}' does not resolve")));
					visited.remove(&pointer);
					return;
				},
			};
			self.check(instance, &resolved, path, visited, issues);
			visited.remove(&pointer);
			return;
		}

		self.check_type(instance, schema, path, issues);
		self.check_enum_and_const(instance, schema, path, issues);
		self.check_numeric(instance, schema, path, issues);
		self.check_string(instance, schema, path, issues);
		self.check_array(instance, schema, path, visited, issues);
		self.check_object(instance, schema, path, visited, issues);
		self.check_composition(instance, schema, path, visited, issues);
	}

	fn check_type(&self, instance: &Value, schema: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
		let declared = match schema.get("type") {
			Some(v) => v,
			None => return,
		};
		let nullable_30 = schema.get("nullable").and_then(Value::as_bool).unwrap_or(false);
		let type_names: Vec<&str> = match declared {
			Value::String(s) => vec![s.as_str()],
			Value::Array(arr) => arr.iter().filter_map(Value::as_str).collect(),
			_ => return,
		};
		let matches = type_names.iter().any(|t| type_matches(instance, t))
			|| (nullable_30 && instance.is_null());
		if !matches {
			issues.push(
				ValidationIssue::new(path, format!("expected type {}", type_names.join(" | ")))
					.with_expected(type_names.join(" | "))
					.with_actual(json_type_name(instance)),
			);
		}
	}

	fn check_enum_and_const(
		&self,
		instance: &Value,
		schema: &Value,
		path: &str,
		issues: &mut Vec<ValidationIssue>,
	) {
		if let Some(Value::Array(allowed)) = schema.get("enum") {
			if !allowed.contains(instance) {
				issues.push(ValidationIssue::new(path, "value is not one of the allowed enum values"));
			}
		}
		if let Some(expected) = schema.get("const") {
			if instance != expected {
				issues.push(ValidationIssue::new(path, "value does not equal the required const"));
			}
		}
	}

	fn check_numeric(&self, instance: &Value, schema: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
		let Some(n) = instance.as_f64() else { return };
		if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
			if n < min {
				issues.push(ValidationIssue::new(path, format!("value {n} is below minimum {min}")));
			}
		}
		if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
			if n > max {
				issues.push(ValidationIssue::new(path, format!("value {n} exceeds maximum {max}")));
			}
		}
		if let Some(min) = schema.get("exclusiveMinimum").and_then(Value::as_f64) {
			if n <= min {
				issues.push(ValidationIssue::new(path, format!("value {n} must exceed {min}")));
			}
		}
		if let Some(max) = schema.get("exclusiveMaximum").and_then(Value::as_f64) {
			if n >= max {
				issues.push(ValidationIssue::new(path, format!("value {n} must be below {max}")));
			}
		}
		if let Some(step) = schema.get("multipleOf").and_then(Value::as_f64) {
			if step > 0.0 && (n / step).fract().abs() > 1e-9 {
				issues.push(ValidationIssue::new(path, format!("value {n} is not a multiple of {step}")));
			}
		}
	}

	fn check_string(&self, instance: &Value, schema: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
		let Some(s) = instance.as_str() else { return };
		let len = s.chars().count();
		if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
			if (len as u64) < min {
				issues.push(ValidationIssue::new(path, format!("string length {len} is below minLength {min}")));
			}
		}
		if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
			if (len as u64) > max {
				issues.push(ValidationIssue::new(path, format!("string length {len} exceeds maxLength {max}")));
			}
		}
		if let Some(Value::String(pattern)) = schema.get("pattern") {
			match regex::Regex::new(pattern) {
				Ok(re) if !re.is_match(s) => {
					issues.push(ValidationIssue::new(path, format!("value does not match pattern {pattern}")));
				},
				Ok(_) => {},
				Err(_) => issues.push(ValidationIssue::new(path, format!("pattern '{pattern}' is not a valid regex"))),
			}
		}
	}

	fn check_array(
		&self,
		instance: &Value,
		schema: &Value,
		path: &str,
		visited: &mut HashSet<Pointer>,
		issues: &mut Vec<ValidationIssue>,
	) {
		let Value::Array(items) = instance else { return };
		if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
			if (items.len() as u64) < min {
				issues.push(ValidationIssue::new(path, format!("array has {} items, below minItems {min}", items.len())));
			}
		}
		if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
			if (items.len() as u64) > max {
				issues.push(ValidationIssue::new(path, format!("array has {} items, above maxItems {max}", items.len())));
			}
		}
		if schema.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false) {
			let mut seen: Vec<&Value> = Vec::new();
			for item in items {
				if seen.contains(&item) {
					issues.push(ValidationIssue::new(path, "array items must be unique"));
					break;
				}
				seen.push(item);
			}
		}
		if let Some(item_schema) = schema.get("items") {
			for (i, item) in items.iter().enumerate() {
				self.check(item, item_schema, &format!("{path}[{i}]"), visited, issues);
			}
		}
	}

	fn check_object(
		&self,
		instance: &Value,
		schema: &Value,
		path: &str,
		visited: &mut HashSet<Pointer>,
		issues: &mut Vec<ValidationIssue>,
	) {
		let Value::Object(map) = instance else { return };

		if let Some(Value::Array(required)) = schema.get("required") {
			for req in required.iter().filter_map(Value::as_str) {
				if !map.contains_key(req) {
					issues.push(ValidationIssue::new(
						format!("{path}.{req}"),
						format!("missing required property '{req}'"),
					));
				}
			}
		}

		let declared_props = schema.get("properties").and_then(Value::as_object);
		if let Some(props) = declared_props {
			for (name, prop_schema) in props {
				if let Some(value) = map.get(name) {
					self.check(value, prop_schema, &format!("{path}.{name}"), visited, issues);
				}
			}
		}

		if let Some(Value::Object(pattern_props)) = schema.get("patternProperties") {
			for (pattern, prop_schema) in pattern_props {
				if let Ok(re) = regex::Regex::new(pattern) {
					for (key, value) in map {
						if re.is_match(key) {
							self.check(value, prop_schema, &format!("{path}.{key}"), visited, issues);
						}
					}
				}
			}
		}

		match schema.get("additionalProperties") {
			Some(Value::Bool(false)) => {
				let declared: HashSet<&str> = declared_props
					.map(|p| p.keys().map(String::as_str).collect())
					.unwrap_or_default();
				for key in map.keys() {
					if !declared.contains(key.as_str()) {
						issues.push(ValidationIssue::new(
							format!("{path}.{key}"),
							format!("property '{key}' is not allowed by additionalProperties: false"),
						));
					}
				}
			},
			Some(extra_schema) if !matches!(extra_schema, Value::Bool(true)) => {
				let declared: HashSet<&str> = declared_props
					.map(|p| p.keys().map(String::as_str).collect())
					.unwrap_or_default();
				for (key, value) in map {
					if !declared.contains(key.as_str()) {
						self.check(value, extra_schema, &format!("{path}.{key}"), visited, issues);
					}
				}
			},
			_ => {},
		}
	}

	fn check_composition(
		&self,
		instance: &Value,
		schema: &Value,
		path: &str,
		visited: &mut HashSet<Pointer>,
		issues: &mut Vec<ValidationIssue>,
	) {
		if let Some(Value::Array(all_of)) = schema.get("allOf") {
			for sub in all_of {
				self.check(instance, sub, path, visited, issues);
			}
		}
		if let Some(Value::Array(any_of)) = schema.get("anyOf") {
			let passes = any_of.iter().filter(|sub| self.validate_sub(instance, sub)).count();
			if passes == 0 {
				issues.push(ValidationIssue::new(path, "value does not match any of the anyOf schemas"));
			}
		}
		if let Some(Value::Array(one_of)) = schema.get("oneOf") {
			let passes = one_of.iter().filter(|sub| self.validate_sub(instance, sub)).count();
			let ok = match self.one_of_mode {
				OneOfMode::AnyMatch => passes >= 1,
				OneOfMode::ExactlyOne => passes == 1,
			};
			if !ok {
				issues.push(ValidationIssue::new(
					path,
					format!("value matched {passes} of the oneOf schemas, expected {}", one_of_expectation(self.one_of_mode)),
				));
			}
		}
		if let Some(not_schema) = schema.get("not") {
			if self.validate_sub(instance, not_schema) {
				issues.push(ValidationIssue::new(path, "value must not match the 'not' schema"));
			}
		}
	}

	fn validate_sub(&self, instance: &Value, schema: &Value) -> bool {
		let mut visited = HashSet::new();
		let mut issues = Vec::new();
		self.check(instance, schema, "", &mut visited, &mut issues);
		issues.is_empty()
	}
}

fn one_of_expectation(mode: OneOfMode) -> &'static str {
	match mode {
		OneOfMode::AnyMatch => "at least one",
		OneOfMode::ExactlyOne => "exactly one",
	}
}

fn type_matches(instance: &Value, type_name: &str) -> bool {
	match type_name {
		"string" => instance.is_string(),
		"integer" => instance.is_i64() || instance.is_u64() || instance.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false),
		"number" => instance.is_number(),
		"boolean" => instance.is_boolean(),
		"object" => instance.is_object(),
		"array" => instance.is_array(),
		"null" => instance.is_null(),
		_ => true,
	}
}

fn json_type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}
