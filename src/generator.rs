//! Schema-driven synthetic example generation, bounded by a recursion
//! budget and deterministic under a fixed seed.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use crate::pointer::Pointer;
use crate::registry::SchemaRegistry;

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
	pub max_depth: usize,
	pub array_min: usize,
	pub array_max: usize,
	pub seed: i64,
	pub use_examples: bool,
}

impl Default for GeneratorOptions {
	fn default() -> Self {
		GeneratorOptions {
			max_depth: 10,
			array_min: 1,
			array_max: 3,
			seed: 0,
			use_examples: true,
		}
	}
}

enum Rand {
	Seeded(StdRng),
	WallClock,
}

impl Rand {
	fn new(seed: i64) -> Self {
		if seed < 0 {
			Rand::WallClock
		} else {
			Rand::Seeded(StdRng::seed_from_u64(seed as u64))
		}
	}

	fn gen_range(&mut self, lo: usize, hi: usize) -> usize {
		if lo >= hi {
			return lo;
		}
		match self {
			Rand::Seeded(rng) => rng.random_range(lo..=hi),
			Rand::WallClock => rand::rng().random_range(lo..=hi),
		}
	}
}

struct Context<'a> {
	registry: &'a SchemaRegistry,
	options: &'a GeneratorOptions,
	visited_refs: HashSet<Pointer>,
	memo: HashMap<(String, usize), Value>,
	rand: Rand,
}

pub struct Generator<'a> {
	registry: &'a SchemaRegistry,
	options: GeneratorOptions,
}

impl<'a> Generator<'a> {
	pub fn new(registry: &'a SchemaRegistry, options: GeneratorOptions) -> Self {
		Generator { registry, options }
	}

	pub fn generate_from_pointer(&self, pointer: &Pointer) -> Value {
		let Some(schema) = self.registry.resolve(pointer) else {
			return Value::Null;
		};
		self.generate(schema)
	}

	pub fn generate(&self, schema: &Value) -> Value {
		let mut ctx = Context {
			registry: self.registry,
			options: &self.options,
			visited_refs: HashSet::new(),
			memo: HashMap::new(),
			rand: Rand::new(self.options.seed),
		};
		generate_inner(schema, 0, &mut ctx)
	}

	/// Priority order for a media-type object: explicit `example`, then the
	/// first entry of `examples`, then generate from `schema`.
	pub fn generate_from_media_type(&self, media: &Value) -> (Value, ExampleSource) {
		if let Some(example) = media.get("example") {
			return (example.clone(), ExampleSource::Provided);
		}
		if let Some(Value::Object(examples)) = media.get("examples") {
			if let Some((_, first)) = examples.iter().next() {
				if let Some(value) = first.get("value") {
					return (value.clone(), ExampleSource::Provided);
				}
			}
		}
		match media.get("schema") {
			Some(schema) => (self.generate(schema), ExampleSource::Generated),
			None => (Value::Null, ExampleSource::None),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleSource {
	Provided,
	Generated,
	None,
}

impl ExampleSource {
	pub fn as_header_value(&self) -> &'static str {
		match self {
			ExampleSource::Provided => "provided",
			ExampleSource::Generated => "generated",
			ExampleSource::None => "none",
		}
	}
}

fn generate_inner(schema: &Value, depth: usize, ctx: &mut Context<'_>) -> Value {
	if depth > ctx.options.max_depth {
		return Value::Null;
	}

	if let Value::Bool(allowed) = schema {
		return if *allowed { json!({}) } else { Value::Null };
	}

	if let Some(Value::String(raw_ref)) = schema.get("$ref") {
		let pointer = match Pointer::parse(raw_ref) {
			Ok(p) => p,
			Err(_) => return Value::Null,
		};
		if ctx.visited_refs.contains(&pointer) {
			return json!({"$comment": "truncated to break a reference cycle", pointer.to_wire(): "truncated"});
		}
		let memo_key = (pointer.to_wire(), depth.min(1));
		if let Some(cached) = ctx.memo.get(&memo_key) {
			return cached.clone();
		}
		let Some(resolved) = ctx.registry.resolve(&pointer).cloned() else {
			return Value::Null;
		};
		ctx.visited_refs.insert(pointer.clone());
		let generated = generate_inner(&resolved, depth + 1, ctx);
		ctx.visited_refs.remove(&pointer);
		ctx.memo.insert(memo_key, generated.clone());
		return generated;
	}

	if ctx.options.use_examples {
		if let Some(example) = schema.get("example") {
			return example.clone();
		}
	}

	if let Some(Value::Array(one_of)) = schema.get("oneOf") {
		if let Some(first) = one_of.first() {
			return generate_inner(first, depth + 1, ctx);
		}
	}
	if let Some(Value::Array(any_of)) = schema.get("anyOf") {
		if let Some(first) = any_of.first() {
			return generate_inner(first, depth + 1, ctx);
		}
	}
	if let Some(Value::Array(all_of)) = schema.get("allOf") {
		let mut merged = json!({});
		for sub in all_of {
			let generated = generate_inner(sub, depth + 1, ctx);
			deep_merge(&mut merged, generated);
		}
		return merged;
	}

	match schema.get("type").and_then(Value::as_str) {
		Some("string") => generate_string(schema),
		Some("integer") => generate_integer(schema),
		Some("number") => generate_number(schema),
		Some("boolean") => Value::Bool(true),
		Some("array") => generate_array(schema, depth, ctx),
		Some("object") => generate_object(schema, depth, ctx),
		Some("null") => Value::Null,
		_ => {
			if schema.get("properties").is_some() {
				generate_object(schema, depth, ctx)
			} else if schema.get("items").is_some() {
				generate_array(schema, depth, ctx)
			} else {
				json!({})
			}
		},
	}
}

fn generate_string(schema: &Value) -> Value {
	match schema.get("format").and_then(Value::as_str) {
		Some("date") => return Value::String("2024-01-01".to_string()),
		Some("date-time") => return Value::String("2024-01-01T00:00:00Z".to_string()),
		Some("email") => return Value::String("user@example.com".to_string()),
		Some("uri") | Some("url") => return Value::String("https://example.com/resource".to_string()),
		Some("uuid") => return Value::String("00000000-0000-4000-8000-000000000000".to_string()),
		_ => {},
	}
	let min_len = schema.get("minLength").and_then(Value::as_u64).unwrap_or(0).max(6) as usize;
	let max_len = schema.get("maxLength").and_then(Value::as_u64).map(|v| v as usize);
	let len = max_len.map(|m| min_len.min(m)).unwrap_or(min_len);
	Value::String("x".repeat(len.max(1)))
}

fn generate_integer(schema: &Value) -> Value {
	let min = schema.get("minimum").and_then(Value::as_f64).unwrap_or(0.0);
	let max = schema.get("maximum").and_then(Value::as_f64).unwrap_or(100.0);
	Value::from(((min + max) / 2.0).floor() as i64)
}

fn generate_number(schema: &Value) -> Value {
	let min = schema.get("minimum").and_then(Value::as_f64).unwrap_or(0.0);
	let max = schema.get("maximum").and_then(Value::as_f64).unwrap_or(100.0);
	Value::from((min + max) / 2.0)
}

fn generate_array(schema: &Value, depth: usize, ctx: &mut Context<'_>) -> Value {
	let min_items = schema.get("minItems").and_then(Value::as_u64).unwrap_or(0) as usize;
	let array_min = ctx.options.array_min;
	let array_max = ctx.options.array_max.max(array_min);
	// The spec's target length, clamped into the configured bounds -- this is
	// a floor on the *target*, not on the bounds themselves, so an
	// `array_min`/`array_max` of 0 still yields an empty array.
	let target = min_items.max(1).clamp(array_min, array_max);

	let items_schema = schema.get("items");
	let cyclic = items_schema
		.and_then(Value::as_object)
		.and_then(|o| o.get("$ref"))
		.and_then(Value::as_str)
		.and_then(|r| Pointer::parse(r).ok())
		.map(|p| ctx.registry.is_cyclic(&p.to_wire()))
		.unwrap_or(false);

	let len = if cyclic { target.min(2) } else { ctx.rand.gen_range(target, array_max) };

	let Some(items_schema) = items_schema else {
		return Value::Array(Vec::new());
	};

	(0..len).map(|_| generate_inner(items_schema, depth + 1, ctx)).collect::<Vec<_>>().into()
}

fn generate_object(schema: &Value, depth: usize, ctx: &mut Context<'_>) -> Value {
	let mut obj = serde_json::Map::new();
	let required: HashSet<&str> = schema
		.get("required")
		.and_then(Value::as_array)
		.map(|v| v.iter().filter_map(Value::as_str).collect())
		.unwrap_or_default();

	if let Some(Value::Object(props)) = schema.get("properties") {
		for (name, prop_schema) in props {
			let is_required = required.contains(name.as_str());
			let is_cyclic_ref = prop_schema
				.get("$ref")
				.and_then(Value::as_str)
				.and_then(|r| Pointer::parse(r).ok())
				.map(|p| ctx.registry.is_cyclic(&p.to_wire()))
				.unwrap_or(false);
			if !is_required && is_cyclic_ref && depth > 3 {
				continue;
			}
			obj.insert(name.clone(), generate_inner(prop_schema, depth + 1, ctx));
		}
	}

	match schema.get("additionalProperties") {
		Some(Value::Bool(true)) => {
			obj.insert("extra".to_string(), Value::String("x".to_string()));
		},
		Some(extra_schema) if !matches!(extra_schema, Value::Bool(false)) => {
			obj.insert("extra".to_string(), generate_inner(extra_schema, depth + 1, ctx));
		},
		_ => {},
	}

	Value::Object(obj)
}

fn deep_merge(base: &mut Value, other: Value) {
	match (base, other) {
		(Value::Object(base_map), Value::Object(other_map)) => {
			for (key, value) in other_map {
				match base_map.get_mut(&key) {
					Some(existing) => deep_merge(existing, value),
					None => {
						base_map.insert(key, value);
					},
				}
			}
		},
		(slot, other) => *slot = other,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use crate::refgraph::RefGraph;
	use serde_json::json;

	#[test]
	fn generates_deterministic_output_for_fixed_seed() {
		let doc = json!({});
		let graph = RefGraph::build(&doc);
		let registry = SchemaRegistry::new(Arc::new(doc.clone()), Arc::new(graph.clone()));
		let schema = json!({"type": "array", "items": {"type": "integer"}});
		let opts = GeneratorOptions { seed: 0, array_min: 3, array_max: 3, ..Default::default() };
		let gen1 = Generator::new(&registry, opts.clone());
		let gen2 = Generator::new(&registry, opts);
		assert_eq!(gen1.generate(&schema), gen2.generate(&schema));
	}

	#[test]
	fn terminates_on_self_referential_schema() {
		let doc = json!({
			"components": {"schemas": {
				"Node": {"type": "object", "properties": {"child": {"$ref": "#/components/schemas/Node"}}},
			}},
		});
		let graph = RefGraph::build(&doc);
		let registry = SchemaRegistry::new(Arc::new(doc.clone()), Arc::new(graph.clone()));
		let pointer = Pointer::parse("#/components/schemas/Node").unwrap();
		let r#gen = Generator::new(&registry, GeneratorOptions::default());
		let value = r#gen.generate_from_pointer(&pointer);
		assert!(value.is_object());
	}

	#[test]
	fn array_size_zero_produces_empty_array() {
		let doc = json!({});
		let graph = RefGraph::build(&doc);
		let registry = SchemaRegistry::new(Arc::new(doc.clone()), Arc::new(graph.clone()));
		let schema = json!({"type": "array", "items": {"type": "string"}});
		let opts = GeneratorOptions { array_min: 0, array_max: 0, ..Default::default() };
		let r#gen = Generator::new(&registry, opts);
		assert_eq!(r#gen.generate(&schema), json!([]));
	}

	#[test]
	fn media_type_prefers_explicit_example() {
		let doc = json!({});
		let graph = RefGraph::build(&doc);
		let registry = SchemaRegistry::new(Arc::new(doc.clone()), Arc::new(graph.clone()));
		let r#gen = Generator::new(&registry, GeneratorOptions::default());
		let media = json!({"example": {"status": "ok"}, "schema": {"type": "object"}});
		let (value, source) = r#gen.generate_from_media_type(&media);
		assert_eq!(value, json!({"status": "ok"}));
		assert_eq!(source, ExampleSource::Provided);
	}
}
