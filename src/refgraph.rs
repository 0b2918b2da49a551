//! The reference graph: every `$ref` edge in the document, its cycle
//! decomposition, and lazily-computed chain depth.
//!
//! Generalizes the recursive resolve-and-descend pattern used elsewhere in
//! the corpus against typed schemas into a plain directed graph over
//! pointers, built once from [`pointer::collect_refs`].

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::pointer::{self, Pointer};

/// A closed loop of pointers: `path[0] == path[last]` after normalization.
pub type Cycle = Vec<Pointer>;

#[derive(Clone)]
pub struct RefGraph {
	/// schema-root pointer -> schema-root pointers referenced from it. Both
	/// sides are normalized via [`pointer::schema_root`] so a `$ref` nested
	/// anywhere inside a schema's subtree is attributed to that schema, not
	/// to the literal node holding the `$ref` key.
	edges: HashMap<Pointer, Vec<Pointer>>,
	/// every pointer that participates in P (container or target of an edge).
	participants: HashSet<Pointer>,
	/// raw ref string -> whether it resolved, kept so unresolved refs are
	/// still reportable even though they don't get a graph edge.
	unresolved: Vec<(Pointer, String)>,
	cycles: Vec<Cycle>,
}

impl RefGraph {
	/// Builds the graph by walking `doc` once. Pre-order traversal over
	/// object keys in parse order then array indices ascending, matching
	/// `pointer::collect_refs`'s own order, so cycle reports are
	/// reproducible across runs of the same document.
	pub fn build(doc: &Value) -> Self {
		let mut edges: HashMap<Pointer, Vec<Pointer>> = HashMap::new();
		let mut participants = HashSet::new();
		let mut unresolved = Vec::new();

		for occurrence in pointer::collect_refs(doc) {
			match pointer::Pointer::parse(&occurrence.target) {
				Ok(target) if pointer::resolve(doc, &target).is_some() => {
					let source = pointer::schema_root(&occurrence.container);
					let target = pointer::schema_root(&target);
					participants.insert(source.clone());
					participants.insert(target.clone());
					edges.entry(source).or_default().push(target);
				},
				_ => unresolved.push((occurrence.container, occurrence.target)),
			}
		}

		let cycles = detect_cycles(&edges);

		RefGraph {
			edges,
			participants,
			unresolved,
			cycles,
		}
	}

	pub fn is_participant(&self, p: &Pointer) -> bool {
		self.participants.contains(p)
	}

	pub fn participants(&self) -> impl Iterator<Item = &Pointer> {
		self.participants.iter()
	}

	pub fn unresolved(&self) -> &[(Pointer, String)] {
		&self.unresolved
	}

	pub fn cycles(&self) -> &[Cycle] {
		&self.cycles
	}

	pub fn is_cyclic(&self, p: &Pointer) -> bool {
		self.cycles.iter().any(|c| c.contains(p))
	}

	pub fn edges_from(&self, p: &Pointer) -> &[Pointer] {
		self.edges.get(p).map(|v| v.as_slice()).unwrap_or(&[])
	}

	/// Total number of resolved `$ref` edges in the document.
	pub fn edge_count(&self) -> usize {
		self.edges.values().map(|v| v.len()).sum()
	}

	/// Number of distinct pointers that sit on at least one cycle.
	pub fn cyclic_participant_count(&self) -> usize {
		let mut seen = HashSet::new();
		for cycle in &self.cycles {
			seen.extend(cycle.iter());
		}
		seen.len()
	}

	/// Longest acyclic path starting at `p`. Pointers inside a cycle
	/// contribute depth 0, per the spec's lazy chain-depth definition.
	pub fn chain_depth(&self, p: &Pointer) -> usize {
		if self.is_cyclic(p) {
			return 0;
		}
		let mut visited = HashSet::new();
		self.chain_depth_inner(p, &mut visited)
	}

	fn chain_depth_inner(&self, p: &Pointer, visited: &mut HashSet<Pointer>) -> usize {
		if !visited.insert(p.clone()) {
			return 0;
		}
		let mut best = 0;
		for next in self.edges_from(p) {
			if self.is_cyclic(next) {
				continue;
			}
			best = best.max(1 + self.chain_depth_inner(next, visited));
		}
		visited.remove(p);
		best
	}
}

/// DFS-based cycle detection over the edge map. A back-edge to an ancestor
/// still on the current path closes a cycle; the exact sub-path from that
/// ancestor to the current node (plus the closing edge) is recorded. Cycles
/// are deduplicated by their sorted-pointer signature so a schema that
/// participates in the same loop discovered from two starting points is
/// only reported once.
fn detect_cycles(edges: &HashMap<Pointer, Vec<Pointer>>) -> Vec<Cycle> {
	let mut cycles: Vec<Cycle> = Vec::new();
	let mut seen_signatures: HashSet<Vec<Pointer>> = HashSet::new();
	let mut global_visited: HashSet<Pointer> = HashSet::new();

	let mut starts: Vec<&Pointer> = edges.keys().collect();
	starts.sort_by(|a, b| a.to_wire().cmp(&b.to_wire()));

	for start in starts {
		if global_visited.contains(start) {
			continue;
		}
		let mut stack: Vec<Pointer> = Vec::new();
		let mut on_stack: HashSet<Pointer> = HashSet::new();
		dfs(
			start,
			edges,
			&mut stack,
			&mut on_stack,
			&mut global_visited,
			&mut cycles,
			&mut seen_signatures,
		);
	}

	cycles
}

fn dfs(
	node: &Pointer,
	edges: &HashMap<Pointer, Vec<Pointer>>,
	stack: &mut Vec<Pointer>,
	on_stack: &mut HashSet<Pointer>,
	global_visited: &mut HashSet<Pointer>,
	cycles: &mut Vec<Cycle>,
	seen_signatures: &mut HashSet<Vec<Pointer>>,
) {
	stack.push(node.clone());
	on_stack.insert(node.clone());
	global_visited.insert(node.clone());

	if let Some(targets) = edges.get(node) {
		for target in targets {
			if on_stack.contains(target) {
				let start_idx = stack.iter().position(|p| p == target).unwrap();
				let mut cycle: Cycle = stack[start_idx..].to_vec();
				cycle.push(target.clone());
				let mut signature = cycle.clone();
				signature.sort_by(|a, b| a.to_wire().cmp(&b.to_wire()));
				if seen_signatures.insert(signature) {
					cycles.push(cycle);
				}
			} else if !global_visited.contains(target) {
				dfs(
					target,
					edges,
					stack,
					on_stack,
					global_visited,
					cycles,
					seen_signatures,
				);
			}
		}
	}

	stack.pop();
	on_stack.remove(node);
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn finds_no_cycle_in_acyclic_document() {
		let doc = json!({
			"components": {"schemas": {
				"A": {"properties": {"b": {"$ref": "#/components/schemas/B"}}},
				"B": {"type": "string"},
			}},
		});
		let graph = RefGraph::build(&doc);
		assert!(graph.cycles().is_empty());
		let a = Pointer::parse("#/components/schemas/A").unwrap();
		assert_eq!(graph.chain_depth(&a), 1);
	}

	#[test]
	fn detects_self_cycle() {
		let doc = json!({
			"components": {"schemas": {
				"Node": {"properties": {"child": {"$ref": "#/components/schemas/Node"}}},
			}},
		});
		let graph = RefGraph::build(&doc);
		assert_eq!(graph.cycles().len(), 1);
		let node = Pointer::parse("#/components/schemas/Node").unwrap();
		assert!(graph.is_cyclic(&node));
		assert_eq!(graph.chain_depth(&node), 0);
	}

	#[test]
	fn records_unresolved_refs() {
		let doc = json!({"a": {"$ref": "#/does/not/exist"}});
		let graph = RefGraph::build(&doc);
		assert_eq!(graph.unresolved().len(), 1);
		assert_eq!(graph.unresolved()[0].1, "#/does/not/exist");
	}

	#[test]
	fn dedups_cycle_reached_from_two_entry_points() {
		let doc = json!({
			"components": {"schemas": {
				"A": {"properties": {"b": {"$ref": "#/components/schemas/B"}}},
				"B": {"properties": {"a": {"$ref": "#/components/schemas/A"}}},
			}},
		});
		let graph = RefGraph::build(&doc);
		assert_eq!(graph.cycles().len(), 1);
	}
}
