use crate::diagnostics::{Analyzer, Attribution, AttributionKind, Diagnostic, Severity};
use crate::refgraph::RefGraph;
use crate::registry::SchemaRegistry;

pub struct CycleAnalyzer;

impl Analyzer for CycleAnalyzer {
	fn name(&self) -> &'static str {
		"cycles"
	}

	fn codes(&self) -> &'static [&'static str] {
		&["ref-cycle"]
	}

	fn analyze(&self, _registry: &SchemaRegistry, graph: &RefGraph) -> Vec<Diagnostic> {
		graph
			.cycles()
			.iter()
			.map(|cycle| {
				let shown: Vec<String> = cycle.iter().take(3).map(|p| p.to_wire()).collect();
				let suffix = if cycle.len() > 3 {
					format!(" (+{} more)", cycle.len() - 3)
				} else {
					String::new()
				};
				Diagnostic {
					code: "ref-cycle".to_string(),
					severity: Severity::Warning,
					pointer: cycle[0].to_wire(),
					message: format!("reference cycle: {}{}", shown.join(" -> "), suffix),
					attribution: Attribution {
						kind: AttributionKind::Spec,
						confidence: 0.8,
						reasoning: "schemas reference each other in a closed loop".to_string(),
					},
					suggestion: None,
					related: cycle.iter().map(|p| p.to_wire()).collect(),
				}
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
	fn reports_one_diagnostic_per_cycle() {
		let doc = json!({
			"components": {"schemas": {
				"Node": {"properties": {"child": {"$ref": "#/components/schemas/Node"}}},
			}},
		});
		let graph = RefGraph::build(&doc);
		let registry = SchemaRegistry::new(Arc::new(doc.clone()), Arc::new(graph.clone()));
		let diags = CycleAnalyzer.analyze(&registry, &graph);
		assert_eq!(diags.len(), 1);
		assert_eq!(diags[0].severity, Severity::Warning);
	}
}
