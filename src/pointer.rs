//! JSON Pointer resolution over a generic `serde_json::Value` document.
//!
//! This generalizes the resolution style used against typed `openapiv3`
//! structs elsewhere in the corpus (match on `ReferenceOr::Reference` /
//! `::Item`, strip a known components prefix, index into a map) into raw
//! pointer-token navigation, since refs in this domain can target any node
//! in the tree, not just `#/components/schemas/*`.

use serde_json::Value;

use crate::error::PointerError;

/// A parsed JSON Pointer: an ordered sequence of decoded tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Pointer(Vec<String>);

impl Pointer {
	pub fn root() -> Self {
		Pointer(Vec::new())
	}

	pub fn tokens(&self) -> &[String] {
		&self.0
	}

	pub fn is_root(&self) -> bool {
		self.0.is_empty()
	}

	pub fn push(&self, token: impl Into<String>) -> Self {
		let mut tokens = self.0.clone();
		tokens.push(token.into());
		Pointer(tokens)
	}

	/// Parses a pointer from its wire form, which may be a bare `#/a/b`
	/// fragment or a plain `/a/b` pointer without the leading `#`.
	pub fn parse(raw: &str) -> Result<Self, PointerError> {
		let body = raw.strip_prefix('#').unwrap_or(raw);
		if body.is_empty() {
			return Ok(Pointer::root());
		}
		if !body.starts_with('/') {
			return Err(PointerError::InvalidSyntax(raw.to_string()));
		}
		let tokens = body[1..]
			.split('/')
			.map(unescape_token)
			.collect::<Vec<_>>();
		Ok(Pointer(tokens))
	}

	/// Returns a new pointer containing only the first `len` tokens.
	pub fn truncate(&self, len: usize) -> Pointer {
		Pointer(self.0[..len.min(self.0.len())].to_vec())
	}

	/// Renders the pointer back to its `#/a/b~1c` wire form.
	pub fn to_wire(&self) -> String {
		if self.0.is_empty() {
			return "#".to_string();
		}
		let mut out = String::from("#");
		for token in &self.0 {
			out.push('/');
			out.push_str(&escape_token(token));
		}
		out
	}
}

impl std::fmt::Display for Pointer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.to_wire())
	}
}

/// Decodes a single escaped pointer token. Order matters: `~1` must be
/// decoded before `~0`, since `~01` must not become `~1` then `/`.
fn unescape_token(token: &str) -> String {
	token.replace("~1", "/").replace("~0", "~")
}

/// Encodes a single raw token for inclusion in a pointer. `~` must be
/// escaped before `/`, mirroring the reverse order of `unescape_token`.
fn escape_token(token: &str) -> String {
	token.replace('~', "~0").replace('/', "~1")
}

/// Walks `doc` along `pointer`, returning `None` if any segment fails to
/// resolve (unknown object key, out-of-range or malformed array index, or
/// an attempt to index a scalar).
pub fn resolve<'a>(doc: &'a Value, pointer: &Pointer) -> Option<&'a Value> {
	let mut node = doc;
	for token in pointer.tokens() {
		node = match node {
			Value::Object(map) => map.get(token)?,
			Value::Array(items) => {
				let idx = parse_array_index(token)?;
				items.get(idx)?
			},
			_ => return None,
		};
	}
	Some(node)
}

/// Strict array-index parsing: only base-10 digits, no leading zero unless
/// the index is exactly `0`, no sign.
fn parse_array_index(token: &str) -> Option<usize> {
	if token.is_empty() || (token.len() > 1 && token.starts_with('0')) {
		return None;
	}
	if !token.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	token.parse::<usize>().ok()
}

/// Resolves a ref string (`#/...` form) against `doc`.
pub fn resolve_ref<'a>(doc: &'a Value, raw_ref: &str) -> Result<&'a Value, PointerError> {
	let pointer = Pointer::parse(raw_ref)?;
	resolve(doc, &pointer).ok_or_else(|| PointerError::Unresolved(raw_ref.to_string()))
}

/// Normalizes a pointer up to its nearest enclosing `#/components/<type>/<name>`
/// root. A `$ref` buried arbitrarily deep inside a named schema (in an
/// `items`, a nested `properties`, an `allOf` branch, ...) is attributed to
/// that enclosing schema rather than to the literal node holding the `$ref`
/// key, so the reference graph closes cycles at schema granularity instead of
/// stopping one hop short of the node that actually recurs.
pub fn schema_root(p: &Pointer) -> Pointer {
	let tokens = p.tokens();
	if tokens.len() >= 3 && tokens[0] == "components" {
		p.truncate(3)
	} else {
		p.clone()
	}
}

/// One `$ref` occurrence found while walking the document: the pointer of
/// the node that contains the `$ref` key, and the raw ref string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefOccurrence {
	pub container: Pointer,
	pub target: String,
}

/// Streams every `$ref` string in the document in pre-order (object keys in
/// their original parse order, then array indices ascending), matching the
/// deterministic traversal order the reference graph depends on.
pub fn collect_refs(doc: &Value) -> Vec<RefOccurrence> {
	let mut out = Vec::new();
	walk_collect(doc, &Pointer::root(), &mut out);
	out
}

fn walk_collect(node: &Value, here: &Pointer, out: &mut Vec<RefOccurrence>) {
	match node {
		Value::Object(map) => {
			if let Some(Value::String(target)) = map.get("$ref") {
				out.push(RefOccurrence {
					container: here.clone(),
					target: target.clone(),
				});
			}
			for (key, value) in map {
				if key == "$ref" {
					continue;
				}
				walk_collect(value, &here.push(key.clone()), out);
			}
		},
		Value::Array(items) => {
			for (idx, value) in items.iter().enumerate() {
				walk_collect(value, &here.push(idx.to_string()), out);
			}
		},
		_ => {},
	}
}
