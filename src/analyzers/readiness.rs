use serde_json::Value;

use crate::diagnostics::{Analyzer, Attribution, AttributionKind, Diagnostic, Severity};
use crate::pointer::Pointer;
use crate::refgraph::RefGraph;
use crate::registry::SchemaRegistry;

pub struct MockReadinessAnalyzer;

impl Analyzer for MockReadinessAnalyzer {
	fn name(&self) -> &'static str {
		"mock-readiness"
	}

	fn codes(&self) -> &'static [&'static str] {
		&["example-missing"]
	}

	fn analyze(&self, registry: &SchemaRegistry, _graph: &RefGraph) -> Vec<Diagnostic> {
		let mut out = Vec::new();
		let Some(Value::Object(paths)) = registry.doc().get("paths") else {
			return out;
		};
		for (path, item) in paths {
			let Value::Object(methods) = item else { continue };
			for (method, op) in methods {
				if !is_http_method(method) {
					continue;
				}
				let Some(Value::Object(responses)) = op.get("responses") else {
					continue;
				};
				for (status, response) in responses {
					let Some(Value::Object(content)) = response.get("content") else {
						continue;
					};
					for (media_type, media) in content {
						if media.get("example").is_some() || media.get("examples").is_some() {
							continue;
						}
						let has_usable_schema = media.get("schema").is_some();
						if !has_usable_schema {
							let pointer = Pointer::parse(&format!(
								"#/paths/{}/{}/responses/{}/content/{}",
								escape_path_key(path),
								method,
								status,
								escape_path_key(media_type)
							))
							.unwrap();
							out.push(Diagnostic {
								code: "example-missing".to_string(),
								severity: Severity::Info,
								pointer: pointer.to_wire(),
								message: format!(
									"{method} {path} -> {status} ({media_type}) has neither an example nor a schema"
								),
								attribution: Attribution {
									kind: AttributionKind::Spec,
									confidence: 0.5,
									reasoning: "without a schema or example, no conformant mock body can be produced".to_string(),
								},
								suggestion: Some("add a schema or an example to this response".to_string()),
								related: Vec::new(),
							});
						}
					}
				}
			}
		}
		out
	}
}

fn is_http_method(method: &str) -> bool {
	matches!(
		method.to_ascii_lowercase().as_str(),
		"get" | "put" | "post" | "delete" | "options" | "head" | "patch" | "trace"
	)
}

fn escape_path_key(raw: &str) -> String {
	raw.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use serde_json::json;

	#[test]
	fn flags_response_without_schema_or_example() {
		let doc = json!({
			"paths": {
				"/health": {
					"get": {
						"responses": {
							"200": {"content": {"application/json": {}}},
						},
					},
				},
			},
		});
		let graph = RefGraph::build(&doc);
		let registry = SchemaRegistry::new(Arc::new(doc.clone()), Arc::new(graph.clone()));
		let diags = MockReadinessAnalyzer.analyze(&registry, &graph);
		assert_eq!(diags.len(), 1);
		assert_eq!(diags[0].code, "example-missing");
	}

	#[test]
	fn no_diagnostic_when_schema_present() {
		let doc = json!({
			"paths": {
				"/health": {
					"get": {
						"responses": {
							"200": {"content": {"application/json": {"schema": {"type": "object"}}}},
						},
					},
				},
			},
		});
		let graph = RefGraph::build(&doc);
		let registry = SchemaRegistry::new(Arc::new(doc.clone()), Arc::new(graph.clone()));
		let diags = MockReadinessAnalyzer.analyze(&registry, &graph);
		assert!(diags.is_empty());
	}
}
