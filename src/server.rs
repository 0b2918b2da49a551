//! The mock server: binds a listener, routes each request against the
//! compiled route table, drives validation and generation, and attaches the
//! `X-Steady-*` observability headers.
//!
//! Grounded in the teacher's `crates/mock-server/src/lib.rs` (a `Server`
//! struct owning a `TcpListener`-bound `axum::serve` task and a oneshot
//! shutdown channel) and `crates/agentgateway/src/ui.rs` (`Router::new()`
//! with `.layer(...)`/`.with_state(...)`), generalized from a single `/echo`
//! route to this domain's own dynamic dispatch table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::FutureExt;
use openapiv3::{Operation, OpenAPI, PathItem, ReferenceOr};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::{Mode, ServerConfig};
use crate::diagnostics::{Diagnostic, DiagnosticCollector};
use crate::generator::{Generator, GeneratorOptions};
use crate::logging::{self, RequestLogFields};
use crate::refgraph::RefGraph;
use crate::registry::SchemaRegistry;
use crate::routing::RouteTable;
use crate::validator::params::{ArrayFormat, ObjectFormat};
use crate::validator::{RequestParts, RequestValidator, ValidatorConfig};
use crate::error::ServerError;

const HEALTH_PATH: &str = "/_x-steady/health";
const SPEC_PATH: &str = "/_x-steady/spec";
const DIAGNOSTICS_PATH: &str = "/_x-steady/diagnostics";

const HTTP_METHODS: [(&str, fn(&PathItem) -> &Option<Operation>); 8] = [
	("GET", |p| &p.get),
	("PUT", |p| &p.put),
	("POST", |p| &p.post),
	("DELETE", |p| &p.delete),
	("OPTIONS", |p| &p.options),
	("HEAD", |p| &p.head),
	("PATCH", |p| &p.patch),
	("TRACE", |p| &p.trace),
];

/// Everything a request needs, built once at startup and shared read-only
/// across every task via `Arc`. No field here is ever mutated after
/// construction except through the collector's own interior mutability.
pub struct AppState {
	raw: Arc<Value>,
	registry: Arc<SchemaRegistry>,
	graph: Arc<RefGraph>,
	routes: RouteTable,
	operations: HashMap<(String, String), Operation>,
	config: ServerConfig,
	collector: Arc<DiagnosticCollector>,
	spec_title: String,
	spec_version: String,
}

impl AppState {
	/// Extracts every (pattern, method) operation from the typed document and
	/// compiles the route table in one pass. Path-item-level parameters are
	/// folded into each operation's own so the validator only ever has to
	/// look in one place.
	pub fn build(raw: Arc<Value>, typed: &OpenAPI, graph: Arc<RefGraph>, registry: Arc<SchemaRegistry>, config: ServerConfig, collector: Arc<DiagnosticCollector>) -> Result<Self, ServerError> {
		let mut operations = HashMap::new();
		let mut patterns = Vec::new();

		for (pattern, item) in &typed.paths.paths {
			let ReferenceOr::Item(path_item) = item else { continue };
			let mut has_operation = false;
			for (method, accessor) in HTTP_METHODS {
				let Some(op) = accessor(path_item) else { continue };
				let mut op = op.clone();
				if !path_item.parameters.is_empty() {
					let mut combined = path_item.parameters.clone();
					combined.extend(op.parameters);
					op.parameters = combined;
				}
				operations.insert((pattern.clone(), method.to_string()), op);
				has_operation = true;
			}
			if has_operation {
				patterns.push(pattern.clone());
			}
		}

		let routes = RouteTable::build(patterns).map_err(|e| ServerError::Bind {
			host: config.host.clone(),
			port: config.port,
			source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
		})?;

		if operations.is_empty() {
			return Err(ServerError::NoServableOperations);
		}

		let spec_title = raw.get("info").and_then(|i| i.get("title")).and_then(Value::as_str).unwrap_or("untitled").to_string();
		let spec_version = raw.get("info").and_then(|i| i.get("version")).and_then(Value::as_str).unwrap_or("0.0.0").to_string();

		Ok(AppState {
			raw,
			registry,
			graph,
			routes,
			operations,
			config,
			collector,
			spec_title,
			spec_version,
		})
	}
}

pub fn build_router(state: Arc<AppState>) -> Router {
	Router::new()
		.route(HEALTH_PATH, get(health_handler))
		.route(SPEC_PATH, get(spec_handler))
		.route(DIAGNOSTICS_PATH, get(diagnostics_handler))
		.fallback(dispatch)
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

pub async fn run(state: AppState, shutdown: CancellationToken) -> Result<(), ServerError> {
	let host = state.config.host.clone();
	let port = state.config.port;
	let addr = format!("{host}:{port}");
	let listener = tokio::net::TcpListener::bind(addr.as_str())
		.await
		.map_err(|source| ServerError::Bind { host, port, source })?;

	let router = build_router(Arc::new(state));
	axum::serve(listener, router)
		.with_graceful_shutdown(async move { shutdown.cancelled().await })
		.await
		.map_err(|source| ServerError::Bind {
			host: "0.0.0.0".to_string(),
			port,
			source,
		})
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
	Json(json!({
		"status": "healthy",
		"version": env!("CARGO_PKG_VERSION"),
		"spec": {"title": state.spec_title, "version": state.spec_version},
		"schemas": {
			"totalRefs": state.graph.edge_count(),
			"cached": state.registry.cached_count(),
			"cyclicRefs": state.graph.cyclic_participant_count(),
		},
	}))
}

async fn spec_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
	Json((*state.raw).clone())
}

async fn diagnostics_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
	Json(serde_json::to_value(state.collector.summary()).unwrap_or(Value::Null))
}

/// The per-request pipeline: route, validate, generate, serialize, observe.
/// Match errors are represented as ordinary responses; an unexpected panic
/// anywhere in the pipeline is caught here and turned into a 500 instead of
/// taking down the task, since a client can never see anything but a
/// well-formed HTTP response from this server.
async fn dispatch(State(state): State<Arc<AppState>>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
	match std::panic::AssertUnwindSafe(dispatch_inner(state, method, uri, headers, body))
		.catch_unwind()
		.await
	{
		Ok(response) => response,
		Err(_) => {
			tracing::error!("request handler panicked");
			(StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "internal server error"}))).into_response()
		},
	}
}

async fn dispatch_inner(state: Arc<AppState>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
	let started = Instant::now();
	let path = uri.path();
	let raw_query = uri.query().unwrap_or("");

	let effective_mode = resolve_mode(&headers, state.config.mode);

	let Some((compiled, path_params)) = state.routes.find(path) else {
		return not_found(&state, "no route matches this path", nearby_patterns(&state, path));
	};
	let pattern = compiled.pattern.clone();

	let method_upper = method.as_str().to_ascii_uppercase();
	let Some(operation) = state.operations.get(&(pattern.clone(), method_upper.clone())) else {
		let allowed = allowed_methods(&state, &pattern);
		return method_not_allowed(&pattern, &allowed);
	};

	let header_map = flatten_headers(&headers);
	let content_type = header_map.get("content-type").map(String::as_str);
	let body_slice = if body.is_empty() { None } else { Some(body.as_ref()) };

	let validator_config = request_validator_config(&state.config, &headers);
	let request_validator = RequestValidator::new(&state.registry, &validator_config);
	let parts = RequestParts {
		path_params: &path_params,
		raw_query,
		headers: &header_map,
		body: body_slice,
		content_type,
	};
	let outcome = request_validator.validate(operation, &parts);
	let issue_count = outcome.issues.len();

	if effective_mode == Mode::Strict && !outcome.issues.is_empty() {
		let elapsed = started.elapsed().as_millis();
		log_and_record(&state, &method_upper, path, Some(pattern.as_str()), 400, effective_mode, elapsed, issue_count, false);
		return validation_failed_response(&pattern, effective_mode, &outcome.issues);
	}

	let responses = match operation_responses(&state, &pattern, &method_upper) {
		Some(responses) => responses,
		None => {
			let elapsed = started.elapsed().as_millis();
			log_and_record(&state, &method_upper, path, Some(pattern.as_str()), 404, effective_mode, elapsed, issue_count, false);
			return not_found(&state, "operation declares no responses", Vec::new());
		},
	};

	let (status, response_value) = match pick_response(&state, responses) {
		Some(pair) => pair,
		None => {
			let elapsed = started.elapsed().as_millis();
			log_and_record(&state, &method_upper, path, Some(pattern.as_str()), 404, effective_mode, elapsed, issue_count, false);
			return not_found(&state, "declared response could not be resolved", Vec::new());
		},
	};

	let media_type = pick_media_type(&response_value);
	let generator_options = request_generator_options(&state.config, &headers);
	let generator = Generator::new(&state.registry, generator_options);

	let (body_value, example_source) = match media_type {
		Some(ref mt) => {
			let media_entry = response_value.get("content").and_then(|c| c.get(mt.as_str())).cloned().unwrap_or(Value::Null);
			generator.generate_from_media_type(&media_entry)
		},
		None => (Value::Null, crate::generator::ExampleSource::None),
	};

	let (serialized, serialization_error) = match serde_json::to_vec(&body_value) {
		Ok(bytes) => (bytes, false),
		Err(_) => (
			serde_json::to_vec(&json!({"error": "response body could not be serialized"})).unwrap_or_default(),
			true,
		),
	};

	let mut response = Response::builder().status(StatusCode::from_u16(status).unwrap_or(StatusCode::OK));
	{
		let headers = response.headers_mut().unwrap();
		headers.insert("content-type", media_type.clone().unwrap_or_else(|| "application/json".to_string()).parse().unwrap());
		headers.insert("x-steady-matched-path", pattern.parse().unwrap());
		headers.insert("x-steady-example-source", example_source.as_header_value().parse().unwrap());
		headers.insert("x-steady-mode", mode_header_value(effective_mode).parse().unwrap());
		if serialization_error {
			headers.insert("x-steady-serialization-error", "true".parse().unwrap());
		}
	}

	let elapsed = started.elapsed().as_millis();
	log_and_record(&state, &method_upper, path, Some(pattern.as_str()), status, effective_mode, elapsed, issue_count, true);

	response.body(axum::body::Body::from(serialized)).unwrap()
}

fn resolve_mode(headers: &HeaderMap, default: Mode) -> Mode {
	match headers.get("x-steady-mode").and_then(|v| v.to_str().ok()) {
		Some(s) if s.eq_ignore_ascii_case("strict") => Mode::Strict,
		Some(s) if s.eq_ignore_ascii_case("relaxed") => Mode::Relaxed,
		_ => default,
	}
}

fn mode_header_value(mode: Mode) -> &'static str {
	match mode {
		Mode::Strict => "strict",
		Mode::Relaxed => "relaxed",
	}
}

fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
	headers
		.iter()
		.map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
		.collect()
}

fn request_validator_config(config: &ServerConfig, headers: &HeaderMap) -> ValidatorConfig {
	let query_array_format = headers
		.get("x-steady-query-array-format")
		.and_then(|v| v.to_str().ok())
		.and_then(parse_array_format)
		.unwrap_or(config.query_array_format);
	let query_object_format = headers
		.get("x-steady-query-object-format")
		.and_then(|v| v.to_str().ok())
		.and_then(parse_object_format)
		.unwrap_or(config.query_object_format);
	ValidatorConfig {
		query_array_format,
		query_object_format,
		form_format: crate::validator::form::FormFormat::Dots,
		one_of_mode: config.one_of_mode,
	}
}

fn parse_array_format(raw: &str) -> Option<ArrayFormat> {
	match raw.to_ascii_lowercase().as_str() {
		"auto" => Some(ArrayFormat::Auto),
		"repeat" => Some(ArrayFormat::Repeat),
		"comma" => Some(ArrayFormat::Comma),
		"space" => Some(ArrayFormat::Space),
		"pipe" => Some(ArrayFormat::Pipe),
		"brackets" => Some(ArrayFormat::Brackets),
		_ => None,
	}
}

fn parse_object_format(raw: &str) -> Option<ObjectFormat> {
	match raw.to_ascii_lowercase().as_str() {
		"auto" => Some(ObjectFormat::Auto),
		"flat" => Some(ObjectFormat::Flat),
		"flat-comma" => Some(ObjectFormat::FlatComma),
		"brackets" => Some(ObjectFormat::Brackets),
		"dots" => Some(ObjectFormat::Dots),
		_ => None,
	}
}

fn request_generator_options(config: &ServerConfig, headers: &HeaderMap) -> GeneratorOptions {
	let mut options = GeneratorOptions {
		array_min: config.array_min,
		array_max: config.array_max,
		seed: config.seed,
		..GeneratorOptions::default()
	};
	if let Some(size) = header_usize(headers, "x-steady-array-size") {
		options.array_min = size;
		options.array_max = size;
	}
	if let Some(min) = header_usize(headers, "x-steady-array-min") {
		options.array_min = min;
	}
	if let Some(max) = header_usize(headers, "x-steady-array-max") {
		options.array_max = max;
	}
	if let Some(seed) = headers.get("x-steady-seed").and_then(|v| v.to_str().ok()).and_then(|s| s.parse::<i64>().ok()) {
		options.seed = seed;
	}
	options
}

fn header_usize(headers: &HeaderMap, name: &str) -> Option<usize> {
	headers.get(name).and_then(|v| v.to_str().ok()).and_then(|s| s.parse::<usize>().ok())
}

/// The raw `responses` object for a matched operation, navigated directly
/// against the document tree rather than through the typed model, since the
/// typed `Responses` type loses which key literally appeared first.
fn operation_responses<'a>(state: &'a AppState, pattern: &str, method: &str) -> Option<&'a serde_json::Map<String, Value>> {
	state
		.raw
		.get("paths")?
		.get(pattern)?
		.get(method.to_ascii_lowercase())?
		.get("responses")?
		.as_object()
}

/// Picks a response entry by status code preference, resolving a `$ref`
/// response through the registry. An unresolved ref is treated the same as
/// "no declared response" by the caller.
fn pick_response(state: &AppState, responses: &serde_json::Map<String, Value>) -> Option<(u16, Value)> {
	let key = ["200", "201", "204"]
		.into_iter()
		.find(|k| responses.contains_key(*k))
		.or_else(|| responses.keys().next().map(String::as_str))?;

	let status: u16 = key.parse().unwrap_or(200);
	let entry = responses.get(key)?;
	let resolved = match entry.get("$ref").and_then(Value::as_str) {
		Some(reference) => state.registry.resolve_ref(reference)?.clone(),
		None => entry.clone(),
	};
	Some((status, resolved))
}

fn pick_media_type(response: &Value) -> Option<String> {
	let content = response.get("content")?.as_object()?;
	if content.contains_key("application/json") {
		return Some("application/json".to_string());
	}
	content.keys().next().cloned()
}

fn allowed_methods(state: &AppState, pattern: &str) -> Vec<String> {
	let mut methods: Vec<String> = state
		.operations
		.keys()
		.filter(|(p, _)| p == pattern)
		.map(|(_, m)| m.clone())
		.collect();
	methods.sort();
	methods
}

fn nearby_patterns(state: &AppState, path: &str) -> Vec<String> {
	let first_segment = path.split('/').find(|s| !s.is_empty());
	state
		.routes
		.patterns()
		.filter(|p| match first_segment {
			Some(seg) => p.contains(seg),
			None => true,
		})
		.take(3)
		.map(str::to_string)
		.collect()
}

fn not_found(_state: &AppState, message: &str, suggestions: Vec<String>) -> Response {
	let body = if suggestions.is_empty() {
		json!({"error": message})
	} else {
		json!({"error": message, "suggestion": suggestions})
	};
	(StatusCode::NOT_FOUND, Json(body)).into_response()
}

fn method_not_allowed(pattern: &str, allowed: &[String]) -> Response {
	(
		StatusCode::NOT_FOUND,
		Json(json!({
			"error": format!("Method Not Allowed for {pattern}"),
			"suggestion": allowed,
		})),
	)
		.into_response()
}

fn validation_failed_response(pattern: &str, mode: Mode, issues: &[crate::diagnostics::ValidationIssue]) -> Response {
	let mut response = (
		StatusCode::BAD_REQUEST,
		Json(json!({"error": "Validation failed", "errors": issues})),
	)
		.into_response();
	let headers = response.headers_mut();
	headers.insert("x-steady-matched-path", pattern.parse().unwrap());
	headers.insert("x-steady-mode", mode_header_value(mode).parse().unwrap());
	response
}

#[allow(clippy::too_many_arguments)]
fn log_and_record(state: &AppState, method: &str, path: &str, matched: Option<&str>, status: u16, mode: Mode, duration_ms: u128, issue_count: usize, success: bool) {
	logging::log_request(
		RequestLogFields {
			method,
			path,
			matched_path: matched,
			status,
			mode: mode_header_value(mode),
			duration_ms,
			issue_count,
		},
		state.config.log_bodies,
		None,
		None,
	);
	let diagnostics: Vec<Diagnostic> = Vec::new();
	state.collector.record(diagnostics, success);
}
