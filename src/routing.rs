//! Path template compilation and request-path matching.
//!
//! New relative to the teacher (its routing lives entirely in axum's own
//! matcher, which can't express OpenAPI-style `{param}` segments or the
//! specificity-ordering fallback this domain needs), but shaped the way the
//! rest of this crate resolves things: compile once at startup, then do pure
//! data lookups on the hot path.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::RouteError;

static MIXED_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^{]*)\{([^}]+)\}(.*)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
	Literal(String),
	Param(String),
	Mixed { prefix: String, name: String, suffix: String },
}

#[derive(Debug, Clone)]
pub struct CompiledPath {
	pub pattern: String,
	pub segments: Vec<Segment>,
}

impl CompiledPath {
	pub fn compile(pattern: &str) -> Result<Self, RouteError> {
		let segments: Vec<Segment> = pattern
			.split('/')
			.filter(|s| !s.is_empty())
			.map(compile_segment)
			.collect::<Result<_, _>>()?;

		let mut seen = std::collections::HashSet::new();
		for segment in &segments {
			let name = match segment {
				Segment::Param(n) | Segment::Mixed { name: n, .. } => Some(n.as_str()),
				Segment::Literal(_) => None,
			};
			if let Some(name) = name {
				if !seen.insert(name) {
					return Err(RouteError::DuplicateParam {
						name: name.to_string(),
						template: pattern.to_string(),
					});
				}
			}
		}

		Ok(CompiledPath {
			pattern: pattern.to_string(),
			segments,
		})
	}

	pub fn is_exact(&self) -> bool {
		self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
	}

	pub fn literal_count(&self) -> usize {
		self.segments
			.iter()
			.filter(|s| matches!(s, Segment::Literal(_)))
			.count()
	}

	/// Attempts to match `request_path` against this compiled pattern,
	/// returning the extracted parameter map on success.
	pub fn matches(&self, request_path: &str) -> Option<HashMap<String, String>> {
		let parts: Vec<&str> = request_path.split('/').filter(|s| !s.is_empty()).collect();
		if parts.len() != self.segments.len() {
			return None;
		}

		let mut params = HashMap::new();
		for (segment, part) in self.segments.iter().zip(parts.iter()) {
			match segment {
				Segment::Literal(lit) => {
					if lit != part {
						return None;
					}
				},
				Segment::Param(name) => {
					let decoded = percent_decode(part)?;
					params.insert(name.clone(), decoded);
				},
				Segment::Mixed { prefix, name, suffix } => {
					if !part.starts_with(prefix.as_str()) || !part.ends_with(suffix.as_str()) {
						return None;
					}
					let middle_start = prefix.len();
					let middle_end = part.len().checked_sub(suffix.len())?;
					if middle_end <= middle_start {
						return None;
					}
					let middle = &part[middle_start..middle_end];
					params.insert(name.clone(), percent_decode(middle)?);
				},
			}
		}
		Some(params)
	}
}

fn compile_segment(raw: &str) -> Result<Segment, RouteError> {
	if raw.starts_with('{') && raw.ends_with('}') && !raw[1..raw.len() - 1].contains('{') {
		return Ok(Segment::Param(raw[1..raw.len() - 1].to_string()));
	}
	if let Some(caps) = MIXED_SEGMENT.captures(raw) {
		return Ok(Segment::Mixed {
			prefix: caps[1].to_string(),
			name: caps[2].to_string(),
			suffix: caps[3].to_string(),
		});
	}
	Ok(Segment::Literal(raw.to_string()))
}

fn percent_decode(raw: &str) -> Option<String> {
	percent_encoding::percent_decode_str(raw)
		.decode_utf8()
		.ok()
		.map(|cow| cow.into_owned())
}

/// The compiled, specificity-ordered route table: exact patterns hashed for
/// O(1) lookup, parameterized patterns tried in specificity-descending,
/// insertion-order-tiebroken order.
pub struct RouteTable {
	exact: HashMap<String, usize>,
	fallback_order: Vec<usize>,
	paths: Vec<CompiledPath>,
}

impl RouteTable {
	pub fn build(patterns: impl IntoIterator<Item = String>) -> Result<Self, RouteError> {
		let paths: Vec<CompiledPath> = patterns
			.into_iter()
			.map(|p| CompiledPath::compile(&p))
			.collect::<Result<_, _>>()?;

		let mut exact = HashMap::new();
		let mut fallback_indices = Vec::new();
		for (idx, path) in paths.iter().enumerate() {
			if path.is_exact() {
				exact.insert(path.pattern.clone(), idx);
			} else {
				fallback_indices.push(idx);
			}
		}
		// Specificity-descending (more literal segments first), ties
		// broken by original insertion order (a stable sort preserves that).
		fallback_indices.sort_by_key(|&idx| std::cmp::Reverse(paths[idx].literal_count()));

		Ok(RouteTable {
			exact,
			fallback_order: fallback_indices,
			paths,
		})
	}

	pub fn find(&self, request_path: &str) -> Option<(&CompiledPath, HashMap<String, String>)> {
		if let Some(&idx) = self.exact.get(request_path) {
			let path = &self.paths[idx];
			if let Some(params) = path.matches(request_path) {
				return Some((path, params));
			}
		}
		for &idx in &self.fallback_order {
			let path = &self.paths[idx];
			if let Some(params) = path.matches(request_path) {
				return Some((path, params));
			}
		}
		None
	}

	pub fn patterns(&self) -> impl Iterator<Item = &str> {
		self.paths.iter().map(|p| p.pattern.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn compiles_literal_param_and_mixed_segments() {
		let compiled = CompiledPath::compile("/users/{id}/file-{name}.txt").unwrap();
		assert_eq!(compiled.segments[0], Segment::Literal("users".to_string()));
		assert_eq!(compiled.segments[1], Segment::Param("id".to_string()));
		assert_eq!(
			compiled.segments[2],
			Segment::Mixed {
				prefix: "file-".to_string(),
				name: "name".to_string(),
				suffix: ".txt".to_string(),
			}
		);
	}

	#[test]
	fn rejects_duplicate_parameter_names() {
		let err = CompiledPath::compile("/a/{id}/b/{id}").unwrap_err();
		assert!(matches!(err, RouteError::DuplicateParam { .. }));
	}

	#[test]
	fn matches_collapsing_empty_segments() {
		let compiled = CompiledPath::compile("/users/{id}").unwrap();
		let params = compiled.matches("//users//123").unwrap();
		assert_eq!(params.get("id"), Some(&"123".to_string()));
		let params2 = compiled.matches("/users/123/").unwrap();
		assert_eq!(params2.get("id"), Some(&"123".to_string()));
	}

	#[test]
	fn bad_percent_encoding_is_no_match_not_crash() {
		let compiled = CompiledPath::compile("/users/{id}").unwrap();
		assert!(compiled.matches("/users/%ZZ").is_none());
	}

	#[test]
	fn exact_routes_win_over_param_routes() {
		let table = RouteTable::build(vec!["/users/{id}".to_string(), "/users/me".to_string()]).unwrap();
		let (matched, params) = table.find("/users/me").unwrap();
		assert_eq!(matched.pattern, "/users/me");
		assert!(params.is_empty());
	}

	#[test]
	fn fallback_order_is_specificity_descending() {
		let table = RouteTable::build(vec![
			"/a/{x}/c".to_string(),
			"/a/b/{y}".to_string(),
		])
		.unwrap();
		let (matched, _) = table.find("/a/b/c").unwrap();
		assert_eq!(matched.pattern, "/a/b/{y}");
	}
}
