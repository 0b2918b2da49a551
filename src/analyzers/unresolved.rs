use crate::diagnostics::{Analyzer, Attribution, AttributionKind, Diagnostic, Severity};
use crate::refgraph::RefGraph;
use crate::registry::SchemaRegistry;

pub struct UnresolvedRefAnalyzer;

impl Analyzer for UnresolvedRefAnalyzer {
	fn name(&self) -> &'static str {
		"unresolved-refs"
	}

	fn codes(&self) -> &'static [&'static str] {
		&["ref-unresolved"]
	}

	fn analyze(&self, _registry: &SchemaRegistry, graph: &RefGraph) -> Vec<Diagnostic> {
		graph
			.unresolved()
			.iter()
			.map(|(container, target)| Diagnostic {
				code: "ref-unresolved".to_string(),
				severity: Severity::Error,
				pointer: container.to_wire(),
				message: format!("reference '{target}' does not resolve to a node in the document"),
				attribution: Attribution {
					kind: AttributionKind::Spec,
					confidence: 0.95,
					reasoning: "the ref target is local ($#/...) but absent from the document tree".to_string(),
				},
				suggestion: Some(format!("add the missing node at {target} or fix the reference")),
				related: Vec::new(),
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use serde_json::json;

	#[test]
	fn flags_unresolved_reference() {
		let doc = json!({"a": {"$ref": "#/components/schemas/Missing"}});
		let graph = RefGraph::build(&doc);
		let registry = SchemaRegistry::new(Arc::new(doc.clone()), Arc::new(graph.clone()));
		let diags = UnresolvedRefAnalyzer.analyze(&registry, &graph);
		assert_eq!(diags.len(), 1);
		assert_eq!(diags[0].code, "ref-unresolved");
		assert_eq!(diags[0].severity, Severity::Error);
	}
}
