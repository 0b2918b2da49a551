//! Query, path, header, and cookie parameter extraction, coercion, and the
//! configurable array/object serialization formats.

use std::collections::HashMap;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayFormat {
	Auto,
	Repeat,
	Comma,
	Space,
	Pipe,
	Brackets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectFormat {
	Auto,
	Flat,
	FlatComma,
	Brackets,
	Dots,
}

/// A flattened view of a query string: repeated keys collected into a
/// `Vec`, preserving encounter order.
pub struct QueryParams(HashMap<String, Vec<String>>);

impl QueryParams {
	pub fn parse(raw_query: &str) -> Self {
		let mut map: HashMap<String, Vec<String>> = HashMap::new();
		for (key, value) in form_urlencoded::parse(raw_query.as_bytes()) {
			map.entry(key.into_owned()).or_default().push(value.into_owned());
		}
		QueryParams(map)
	}

	/// Extracts a single scalar value for `name`, ignoring extra occurrences.
	pub fn scalar(&self, name: &str) -> Option<&str> {
		self.0.get(name).and_then(|v| v.first()).map(String::as_str)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.0.contains_key(name)
	}

	pub fn known_names(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	/// Extracts an array value for `name` per the configured format.
	pub fn array(&self, name: &str, format: ArrayFormat) -> Option<Vec<String>> {
		match format {
			ArrayFormat::Repeat | ArrayFormat::Auto => {
				if let Some(values) = self.0.get(name) {
					return Some(values.clone());
				}
				self.array(name, ArrayFormat::Brackets)
			},
			ArrayFormat::Comma => self.scalar(name).map(|s| s.split(',').map(str::to_string).collect()),
			ArrayFormat::Space => self.scalar(name).map(|s| s.split(' ').map(str::to_string).collect()),
			ArrayFormat::Pipe => self.scalar(name).map(|s| s.split('|').map(str::to_string).collect()),
			ArrayFormat::Brackets => {
				let bracket_key = format!("{name}[]");
				self.0.get(&bracket_key).cloned()
			},
		}
	}

	/// Extracts an object value for `name` per the configured format.
	pub fn object(&self, name: &str, format: ObjectFormat) -> Option<serde_json::Map<String, Value>> {
		match format {
			ObjectFormat::Flat | ObjectFormat::Auto => {
				// flat form: the single value is itself `key,value,key,value...`
				self.scalar(name).map(|s| parse_flat_comma(s))
			},
			ObjectFormat::FlatComma => self.scalar(name).map(|s| parse_flat_comma(s)),
			ObjectFormat::Brackets => {
				let mut obj = serde_json::Map::new();
				let prefix = format!("{name}[");
				for key in self.known_names() {
					if let Some(rest) = key.strip_prefix(&prefix) {
						if let Some(field) = rest.strip_suffix(']') {
							if let Some(v) = self.scalar(key) {
								obj.insert(field.to_string(), Value::String(v.to_string()));
							}
						}
					}
				}
				if obj.is_empty() { None } else { Some(obj) }
			},
			ObjectFormat::Dots => {
				let mut obj = serde_json::Map::new();
				let prefix = format!("{name}.");
				for key in self.known_names() {
					if let Some(field) = key.strip_prefix(&prefix) {
						if let Some(v) = self.scalar(key) {
							obj.insert(field.to_string(), Value::String(v.to_string()));
						}
					}
				}
				if obj.is_empty() { None } else { Some(obj) }
			},
		}
	}
}

fn parse_flat_comma(raw: &str) -> serde_json::Map<String, Value> {
	let tokens: Vec<&str> = raw.split(',').collect();
	let mut obj = serde_json::Map::new();
	for pair in tokens.chunks(2) {
		if let [k, v] = pair {
			obj.insert(k.to_string(), Value::String(v.to_string()));
		}
	}
	obj
}

/// Coerces a raw string parameter value to the schema's primary non-null
/// type. Values that fail to coerce fall back to the raw string so the
/// schema validator can still report a precise type-mismatch issue.
pub fn coerce(raw: &str, schema: &Value) -> Value {
	let primary_type = schema.get("type").and_then(Value::as_str);
	match primary_type {
		Some("integer") => raw.parse::<i64>().map(Value::from).unwrap_or_else(|_| Value::String(raw.to_string())),
		Some("number") => raw.parse::<f64>().map(Value::from).unwrap_or_else(|_| Value::String(raw.to_string())),
		Some("boolean") => match raw {
			"true" | "1" => Value::Bool(true),
			"false" | "0" => Value::Bool(false),
			_ => Value::String(raw.to_string()),
		},
		Some("object") | Some("array") => {
			serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
		},
		_ => Value::String(raw.to_string()),
	}
}

/// Parses the `Cookie` request header into name -> value pairs per RFC 6265
/// (`name=value; name2=value2`, trimmed around `;`).
pub fn parse_cookies(header_value: &str) -> HashMap<String, String> {
	header_value
		.split(';')
		.filter_map(|pair| {
			let mut parts = pair.splitn(2, '=');
			let name = parts.next()?.trim();
			let value = parts.next()?.trim();
			if name.is_empty() {
				None
			} else {
				Some((name.to_string(), value.to_string()))
			}
		})
		.collect()
}

/// Splits a `simple`-style header value for an array-typed header parameter.
pub fn split_simple_header_array(raw: &str) -> Vec<String> {
	raw.split(',').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn repeat_format_collects_all_occurrences() {
		let q = QueryParams::parse("a=1&a=2&a=3");
		assert_eq!(q.array("a", ArrayFormat::Repeat), Some(vec!["1".into(), "2".into(), "3".into()]));
	}

	#[test]
	fn comma_format_splits_single_value() {
		let q = QueryParams::parse("a=1,2,3");
		assert_eq!(q.array("a", ArrayFormat::Comma), Some(vec!["1".into(), "2".into(), "3".into()]));
	}

	#[test]
	fn brackets_object_format() {
		let q = QueryParams::parse("user%5Bname%5D=bob&user%5Bage%5D=9");
		let obj = q.object("user", ObjectFormat::Brackets).unwrap();
		assert_eq!(obj.get("name"), Some(&Value::String("bob".to_string())));
		assert_eq!(obj.get("age"), Some(&Value::String("9".to_string())));
	}

	#[test]
	fn dots_object_format() {
		let q = QueryParams::parse("user.name=bob");
		let obj = q.object("user", ObjectFormat::Dots).unwrap();
		assert_eq!(obj.get("name"), Some(&Value::String("bob".to_string())));
	}

	#[test]
	fn coerces_integer_and_falls_back_on_failure() {
		assert_eq!(coerce("42", &serde_json::json!({"type": "integer"})), Value::from(42));
		assert_eq!(
			coerce("not-a-number", &serde_json::json!({"type": "integer"})),
			Value::String("not-a-number".to_string())
		);
	}

	#[test]
	fn cookie_parsing_trims_whitespace() {
		let cookies = parse_cookies("a=1; b=2 ;c=3");
		assert_eq!(cookies.get("a"), Some(&"1".to_string()));
		assert_eq!(cookies.get("b"), Some(&"2".to_string()));
		assert_eq!(cookies.get("c"), Some(&"3".to_string()));
	}
}
