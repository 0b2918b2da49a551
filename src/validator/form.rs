//! Form body parsing: `application/x-www-form-urlencoded` and
//! `multipart/form-data`, both folding into the same nested-path data model
//! with files pulled out into a side map.
//!
//! Grounded in the teacher's general "separate data by destination" note in
//! `outbound/openapi.rs` (the comment block above `parse_openapi_schema`
//! about headers/body/query/path needing separate destinations) generalized
//! here to form-field destinations: a flat key with `.`/`[]` path syntax
//! folds into nested `serde_json::Value` structure.

use std::collections::HashMap;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFormat {
	Dots,
	Brackets,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
	pub field_name: String,
	pub file_name: Option<String>,
	pub content_type: Option<String>,
	pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum FileSlot {
	Single(UploadedFile),
	Multiple(Vec<UploadedFile>),
}

#[derive(Debug, Default)]
pub struct ParsedForm {
	pub data: Value,
	pub files: HashMap<String, FileSlot>,
}

const FILE_PLACEHOLDER: &str = "[File]";

pub fn parse_urlencoded(body: &[u8], format: FormFormat) -> ParsedForm {
	let mut root = Value::Object(serde_json::Map::new());
	for (key, value) in form_urlencoded::parse(body) {
		assign_path(&mut root, &key, Value::String(value.into_owned()), format);
	}
	ParsedForm { data: root, files: HashMap::new() }
}

/// Parses a `multipart/form-data` body already split into `(field_name,
/// filename, content_type, bytes)` parts (the caller drives `multer`'s
/// streaming API and hands complete parts here so this function stays pure
/// and independently testable).
pub fn assemble_multipart(
	parts: Vec<(String, Option<String>, Option<String>, Vec<u8>)>,
	format: FormFormat,
) -> ParsedForm {
	let mut root = Value::Object(serde_json::Map::new());
	let mut files: HashMap<String, FileSlot> = HashMap::new();

	for (field_name, file_name, content_type, bytes) in parts {
		if file_name.is_some() {
			let upload = UploadedFile {
				field_name: field_name.clone(),
				file_name,
				content_type,
				bytes,
			};
			files
				.entry(field_name.clone())
				.and_modify(|slot| promote_to_multiple(slot, upload.clone()))
				.or_insert(FileSlot::Single(upload));
			assign_path(&mut root, &field_name, Value::String(FILE_PLACEHOLDER.to_string()), format);
		} else {
			let text = String::from_utf8_lossy(&bytes).into_owned();
			assign_path(&mut root, &field_name, Value::String(text), format);
		}
	}

	ParsedForm { data: root, files }
}

fn promote_to_multiple(slot: &mut FileSlot, new_file: UploadedFile) {
	*slot = match std::mem::replace(slot, FileSlot::Multiple(Vec::new())) {
		FileSlot::Single(existing) => FileSlot::Multiple(vec![existing, new_file]),
		FileSlot::Multiple(mut existing) => {
			existing.push(new_file);
			FileSlot::Multiple(existing)
		},
	};
}

/// Splits a flat key into path segments honoring the configured nesting
/// style, then assigns `value` into `root` at that path, creating arrays
/// when a segment is a plain non-negative integer.
fn assign_path(root: &mut Value, raw_key: &str, value: Value, format: FormFormat) {
	let segments = split_key(raw_key, format);
	assign_segments(root, &segments, value);
}

fn split_key(raw_key: &str, format: FormFormat) -> Vec<String> {
	match format {
		FormFormat::Dots => raw_key.split('.').map(str::to_string).collect(),
		FormFormat::Brackets => {
			let mut segments = Vec::new();
			let mut current = String::new();
			let mut chars = raw_key.chars().peekable();
			while let Some(c) = chars.next() {
				match c {
					'[' => {
						if !current.is_empty() {
							segments.push(std::mem::take(&mut current));
						}
					},
					']' => {
						segments.push(std::mem::take(&mut current));
					},
					_ => current.push(c),
				}
			}
			if !current.is_empty() {
				segments.push(current);
			}
			segments.into_iter().filter(|s| !s.is_empty()).collect()
		},
	}
}

fn assign_segments(node: &mut Value, segments: &[String], value: Value) {
	let Some((head, rest)) = segments.split_first() else {
		*node = value;
		return;
	};

	let is_index = head.bytes().all(|b| b.is_ascii_digit()) && !head.is_empty();

	if rest.is_empty() {
		if is_index {
			ensure_array(node);
			if let Value::Array(arr) = node {
				let idx: usize = head.parse().unwrap();
				grow_array(arr, idx);
				arr[idx] = value;
			}
		} else {
			ensure_object(node);
			if let Value::Object(map) = node {
				map.insert(head.clone(), value);
			}
		}
		return;
	}

	if is_index {
		ensure_array(node);
		if let Value::Array(arr) = node {
			let idx: usize = head.parse().unwrap();
			grow_array(arr, idx);
			assign_segments(&mut arr[idx], rest, value);
		}
	} else {
		ensure_object(node);
		if let Value::Object(map) = node {
			let entry = map.entry(head.clone()).or_insert(Value::Null);
			assign_segments(entry, rest, value);
		}
	}
}

fn ensure_object(node: &mut Value) {
	if !node.is_object() {
		*node = Value::Object(serde_json::Map::new());
	}
}

fn ensure_array(node: &mut Value) {
	if !node.is_array() {
		*node = Value::Array(Vec::new());
	}
}

fn grow_array(arr: &mut Vec<Value>, idx: usize) {
	while arr.len() <= idx {
		arr.push(Value::Null);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_simple_urlencoded_fields() {
		let form = parse_urlencoded(b"name=Alice&age=9", FormFormat::Dots);
		assert_eq!(form.data["name"], Value::String("Alice".to_string()));
		assert_eq!(form.data["age"], Value::String("9".to_string()));
	}

	#[test]
	fn dots_nesting_builds_object() {
		let form = parse_urlencoded(b"user.name=Alice&user.address.city=Metropolis", FormFormat::Dots);
		assert_eq!(form.data["user"]["name"], Value::String("Alice".to_string()));
		assert_eq!(form.data["user"]["address"]["city"], Value::String("Metropolis".to_string()));
	}

	#[test]
	fn brackets_with_numeric_index_builds_array() {
		let form = parse_urlencoded(b"tags[0]=a&tags[1]=b", FormFormat::Brackets);
		assert_eq!(form.data["tags"], serde_json::json!(["a", "b"]));
	}

	#[test]
	fn multipart_file_gets_placeholder_and_side_map_entry() {
		let parts = vec![
			("avatar".to_string(), Some("pic.png".to_string()), Some("image/png".to_string()), vec![1, 2, 3]),
			("name".to_string(), None, None, b"Alice".to_vec()),
		];
		let form = assemble_multipart(parts, FormFormat::Dots);
		assert_eq!(form.data["avatar"], Value::String("[File]".to_string()));
		assert_eq!(form.data["name"], Value::String("Alice".to_string()));
		assert!(matches!(form.files.get("avatar"), Some(FileSlot::Single(_))));
	}

	#[test]
	fn multipart_repeated_file_field_becomes_multiple() {
		let parts = vec![
			("docs".to_string(), Some("a.txt".to_string()), None, b"a".to_vec()),
			("docs".to_string(), Some("b.txt".to_string()), None, b"b".to_vec()),
		];
		let form = assemble_multipart(parts, FormFormat::Dots);
		match form.files.get("docs") {
			Some(FileSlot::Multiple(files)) => assert_eq!(files.len(), 2),
			other => panic!("expected Multiple, got {other:?}"),
		}
	}
}
