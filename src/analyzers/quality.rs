use serde_json::Value;

use crate::diagnostics::{Analyzer, Attribution, AttributionKind, Diagnostic, Severity};
use crate::pointer::Pointer;
use crate::refgraph::RefGraph;
use crate::registry::SchemaRegistry;

pub struct SchemaQualityAnalyzer {
	pub max_properties: usize,
	pub max_nesting: usize,
}

impl Default for SchemaQualityAnalyzer {
	fn default() -> Self {
		SchemaQualityAnalyzer {
			max_properties: 50,
			max_nesting: 6,
		}
	}
}

impl Analyzer for SchemaQualityAnalyzer {
	fn name(&self) -> &'static str {
		"schema-quality"
	}

	fn codes(&self) -> &'static [&'static str] {
		&["schema-oversized", "schema-too-nested"]
	}

	fn analyze(&self, registry: &SchemaRegistry, _graph: &RefGraph) -> Vec<Diagnostic> {
		let mut out = Vec::new();
		for (name, schema) in registry.component_schemas() {
			let pointer = Pointer::parse(&format!("#/components/schemas/{name}")).unwrap();
			if let Some(Value::Object(props)) = schema.value.get("properties") {
				if props.len() > self.max_properties {
					out.push(oversized(&pointer, props.len(), self.max_properties));
				}
			}
			let depth = nesting_depth(&schema.value, 0);
			if depth > self.max_nesting {
				out.push(too_nested(&pointer, depth, self.max_nesting));
			}
		}
		out.sort_by(|a, b| a.pointer.cmp(&b.pointer));
		out
	}
}

fn nesting_depth(schema: &Value, depth: usize) -> usize {
	if depth > 64 {
		return depth; // guards against a schema this analyzer itself can't traverse safely
	}
	let mut best = depth;
	if let Some(Value::Object(props)) = schema.get("properties") {
		for prop in props.values() {
			best = best.max(nesting_depth(prop, depth + 1));
		}
	}
	if let Some(items) = schema.get("items") {
		best = best.max(nesting_depth(items, depth + 1));
	}
	best
}

fn oversized(pointer: &Pointer, count: usize, threshold: usize) -> Diagnostic {
	Diagnostic {
		code: "schema-oversized".to_string(),
		severity: Severity::Info,
		pointer: pointer.to_wire(),
		message: format!("schema declares {count} properties, exceeding the {threshold} guideline"),
		attribution: Attribution {
			kind: AttributionKind::Spec,
			confidence: 0.4,
			reasoning: "very wide schemas are often an unintentional catch-all".to_string(),
		},
		suggestion: None,
		related: Vec::new(),
	}
}

fn too_nested(pointer: &Pointer, depth: usize, threshold: usize) -> Diagnostic {
	Diagnostic {
		code: "schema-too-nested".to_string(),
		severity: Severity::Info,
		pointer: pointer.to_wire(),
		message: format!("schema nesting depth {depth} exceeds the {threshold} guideline"),
		attribution: Attribution {
			kind: AttributionKind::Spec,
			confidence: 0.4,
			reasoning: "deeply nested inline schemas are hard for SDK generators to flatten".to_string(),
		},
		suggestion: Some("consider extracting nested objects into named schemas".to_string()),
		related: Vec::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use serde_json::json;

	#[test]
	fn flags_oversized_schema() {
		let mut props = serde_json::Map::new();
		for i in 0..60 {
			props.insert(format!("f{i}"), json!({"type": "string"}));
		}
		let doc = json!({"components": {"schemas": {"Big": {"type": "object", "properties": props}}}});
		let graph = RefGraph::build(&doc);
		let registry = SchemaRegistry::new(Arc::new(doc.clone()), Arc::new(graph.clone()));
		let diags = SchemaQualityAnalyzer::default().analyze(&registry, &graph);
		assert!(diags.iter().any(|d| d.code == "schema-oversized"));
	}
}
