//! Spec loading: reads a path or raw bytes, sniffs JSON vs YAML, and parses
//! both a generic `serde_json::Value` tree and a typed `openapiv3::OpenAPI`
//! projection from the same bytes.

use std::path::{Path, PathBuf};

use openapiv3::OpenAPI;
use serde_json::Value;

use crate::diagnostics::{Attribution, Diagnostic, Severity};
use crate::error::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
	Json,
	Yaml,
}

#[derive(Debug)]
pub enum SpecSource {
	Path(PathBuf),
	Bytes { bytes: Vec<u8>, format: Option<SpecFormat> },
}

impl SpecSource {
	pub fn from_arg(arg: &str) -> Result<Self, LoadError> {
		if arg.starts_with("http://") || arg.starts_with("https://") {
			return Err(LoadError::RemoteNotSupported(arg.to_string()));
		}
		Ok(SpecSource::Path(PathBuf::from(arg)))
	}
}

/// The document loaded at startup: the raw tree every pointer in the core
/// resolves against, plus a typed view used only for structural route and
/// operation extraction.
#[derive(Debug)]
pub struct LoadedSpec {
	pub raw: Value,
	pub typed: OpenAPI,
	/// Non-fatal mismatches between the generic parse and the typed parse,
	/// surfaced as startup diagnostics rather than aborting the load.
	pub startup_diagnostics: Vec<Diagnostic>,
}

pub fn load(source: SpecSource) -> Result<LoadedSpec, LoadError> {
	let (bytes, format) = match source {
		SpecSource::Path(path) => {
			let bytes = std::fs::read(&path).map_err(|source| LoadError::Io {
				path: path.clone(),
				source,
			})?;
			let format = sniff_format(&path, &bytes);
			(bytes, format)
		},
		SpecSource::Bytes { bytes, format } => {
			let format = format.unwrap_or_else(|| sniff_bytes(&bytes));
			(bytes, format)
		},
	};

	if bytes.iter().all(|b| b.is_ascii_whitespace()) {
		return Err(LoadError::Empty);
	}

	let raw: Value = match format {
		SpecFormat::Json => serde_json::from_slice(&bytes)?,
		SpecFormat::Yaml => serde_yaml::from_slice(&bytes)?,
	};

	let mut startup_diagnostics = Vec::new();
	let typed: OpenAPI = match serde_json::from_value(raw.clone()) {
		Ok(typed) => typed,
		Err(e) => {
			startup_diagnostics.push(Diagnostic {
				code: "typed-parse-mismatch".to_string(),
				severity: Severity::Warning,
				pointer: "#".to_string(),
				message: format!("document parses generically but not as a typed OpenAPI document: {e}"),
				attribution: Attribution {
					kind: crate::diagnostics::AttributionKind::Spec,
					confidence: 0.6,
					reasoning: "typed model rejected a field the generic parser accepted".to_string(),
				},
				suggestion: None,
				related: Vec::new(),
			});
			// Fall back to an empty-but-valid document so route/operation
			// extraction degrades to "no routes" instead of aborting startup.
			OpenAPI {
				openapi: "3.0.3".to_string(),
				..Default::default()
			}
		},
	};

	Ok(LoadedSpec {
		raw,
		typed,
		startup_diagnostics,
	})
}

fn sniff_format(path: &Path, bytes: &[u8]) -> SpecFormat {
	match path.extension().and_then(|e| e.to_str()) {
		Some("json") => SpecFormat::Json,
		Some("yaml") | Some("yml") => SpecFormat::Yaml,
		_ => sniff_bytes(bytes),
	}
}

fn sniff_bytes(bytes: &[u8]) -> SpecFormat {
	match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
		Some(b'{') | Some(b'[') => SpecFormat::Json,
		_ => SpecFormat::Yaml,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_remote_sources() {
		let err = SpecSource::from_arg("https://example.com/spec.json").unwrap_err();
		assert!(matches!(err, LoadError::RemoteNotSupported(_)));
	}

	#[test]
	fn sniffs_json_from_bytes() {
		assert_eq!(sniff_bytes(b"  {\"a\":1}"), SpecFormat::Json);
		assert_eq!(sniff_bytes(b"openapi: 3.0.0"), SpecFormat::Yaml);
	}

	#[test]
	fn loads_minimal_json_document() {
		let bytes = br#"{"openapi":"3.0.3","info":{"title":"t","version":"1"},"paths":{}}"#.to_vec();
		let loaded = load(SpecSource::Bytes {
			bytes,
			format: Some(SpecFormat::Json),
		})
		.unwrap();
		assert_eq!(loaded.typed.openapi, "3.0.3");
		assert!(loaded.startup_diagnostics.is_empty());
	}

	#[test]
	fn rejects_empty_document() {
		let err = load(SpecSource::Bytes {
			bytes: b"   ".to_vec(),
			format: Some(SpecFormat::Json),
		})
		.unwrap_err();
		assert!(matches!(err, LoadError::Empty));
	}
}
