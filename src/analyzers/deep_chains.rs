use crate::diagnostics::{Analyzer, Attribution, AttributionKind, Diagnostic, Severity};
use crate::refgraph::RefGraph;
use crate::registry::SchemaRegistry;

pub struct DeepChainAnalyzer {
	pub threshold: usize,
}

impl Default for DeepChainAnalyzer {
	fn default() -> Self {
		DeepChainAnalyzer { threshold: 10 }
	}
}

impl Analyzer for DeepChainAnalyzer {
	fn name(&self) -> &'static str {
		"deep-chains"
	}

	fn codes(&self) -> &'static [&'static str] {
		&["ref-deep-chain"]
	}

	fn analyze(&self, _registry: &SchemaRegistry, graph: &RefGraph) -> Vec<Diagnostic> {
		let mut out = Vec::new();
		for pointer in graph.participants() {
			let depth = graph.chain_depth(pointer);
			if depth > self.threshold {
				out.push(Diagnostic {
					code: "ref-deep-chain".to_string(),
					severity: Severity::Info,
					pointer: pointer.to_wire(),
					message: format!("reference chain depth {depth} exceeds threshold {}", self.threshold),
					attribution: Attribution {
						kind: AttributionKind::Spec,
						confidence: 0.6,
						reasoning: "long ref chains slow traversal and are often unintentional".to_string(),
					},
					suggestion: Some("consider flattening this chain of references".to_string()),
					related: Vec::new(),
				});
			}
		}
		out.sort_by(|a, b| a.pointer.cmp(&b.pointer));
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use serde_json::json;

	#[test]
	fn no_diagnostics_for_shallow_chain() {
		let doc = json!({
			"components": {"schemas": {
				"A": {"properties": {"b": {"$ref": "#/components/schemas/B"}}},
				"B": {"type": "string"},
			}},
		});
		let graph = RefGraph::build(&doc);
		let registry = SchemaRegistry::new(Arc::new(doc.clone()), Arc::new(graph.clone()));
		let diags = DeepChainAnalyzer::default().analyze(&registry, &graph);
		assert!(diags.is_empty());
	}

	#[test]
	fn flags_chain_past_threshold() {
		let mut schemas = serde_json::Map::new();
		for i in 0..12 {
			let next = if i == 11 {
				serde_json::json!({"type": "string"})
			} else {
				serde_json::json!({"properties": {"n": {"$ref": format!("#/components/schemas/S{}", i + 1)}}})
			};
			schemas.insert(format!("S{i}"), next);
		}
		let doc = json!({"components": {"schemas": schemas}});
		let graph = RefGraph::build(&doc);
		let registry = SchemaRegistry::new(Arc::new(doc.clone()), Arc::new(graph.clone()));
		let diags = DeepChainAnalyzer {
			threshold: 5,
		}
		.analyze(&registry, &graph);
		assert!(!diags.is_empty());
	}
}
