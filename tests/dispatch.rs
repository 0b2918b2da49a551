//! End-to-end dispatch tests: build a router over a small in-memory spec and
//! drive it with `tower::util::ServiceExt::oneshot`, the same in-process
//! pattern the corpus uses for axum routers that never need a real listener.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use openapiv3::OpenAPI;
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

use steady::config::{LogLevel, Mode, ServerConfig};
use steady::diagnostics::DiagnosticCollector;
use steady::refgraph::RefGraph;
use steady::registry::SchemaRegistry;
use steady::server::{self, AppState};
use steady::validator::params::{ArrayFormat, ObjectFormat};
use steady::validator::schema::OneOfMode;

fn spec_document() -> Value {
	json!({
		"openapi": "3.0.3",
		"info": {"title": "fixture", "version": "1.0"},
		"paths": {
			"/health": {
				"get": {
					"responses": {
						"200": {
							"description": "ok",
							"content": {
								"application/json": {
									"schema": {"type": "object"},
									"example": {"status": "ok"},
								},
							},
						},
					},
				},
			},
			"/users/{id}": {
				"get": {
					"parameters": [
						{"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}},
					],
					"responses": {
						"200": {
							"description": "ok",
							"content": {
								"application/json": {"schema": {"type": "object", "properties": {"id": {"type": "integer"}}}},
							},
						},
					},
				},
			},
			"/users": {
				"get": {
					"parameters": [
						{"name": "limit", "in": "query", "required": false, "schema": {"type": "integer"}},
					],
					"responses": {
						"200": {
							"description": "ok",
							"content": {"application/json": {"schema": {"type": "array", "items": {"type": "object"}}}},
						},
					},
				},
				"post": {
					"requestBody": {
						"required": true,
						"content": {
							"application/json": {
								"schema": {
									"type": "object",
									"required": ["name", "email"],
									"properties": {"name": {"type": "string"}, "email": {"type": "string"}},
								},
							},
						},
					},
					"responses": {
						"201": {
							"description": "created",
							"content": {"application/json": {"schema": {"type": "object", "properties": {"id": {"type": "integer"}}}}},
						},
					},
				},
			},
			"/items": {
				"get": {
					"responses": {
						"200": {
							"description": "ok",
							"content": {"application/json": {"schema": {"type": "array", "items": {"type": "string"}}}},
						},
					},
				},
			},
			"/tree": {
				"get": {
					"responses": {
						"200": {
							"description": "ok",
							"content": {
								"application/json": {"schema": {"$ref": "#/components/schemas/TreeNode"}},
							},
						},
					},
				},
			},
		},
		"components": {
			"schemas": {
				"TreeNode": {
					"type": "object",
					"properties": {
						"value": {"type": "string"},
						"children": {"type": "array", "items": {"$ref": "#/components/schemas/TreeNode"}},
					},
				},
			},
		},
	})
}

fn test_config(mode: Mode) -> ServerConfig {
	ServerConfig {
		host: "127.0.0.1".to_string(),
		port: 0,
		mode,
		log_level: LogLevel::Summary,
		log_bodies: false,
		query_array_format: ArrayFormat::Repeat,
		query_object_format: ObjectFormat::Flat,
		one_of_mode: OneOfMode::AnyMatch,
		array_min: 1,
		array_max: 1,
		seed: 0,
	}
}

fn build_router(mode: Mode) -> axum::Router {
	let raw = Arc::new(spec_document());
	let typed: OpenAPI = serde_json::from_value((*raw).clone()).expect("fixture parses as a typed document");
	let graph = Arc::new(RefGraph::build(&raw));
	let registry = Arc::new(SchemaRegistry::new(raw.clone(), graph.clone()));
	let collector = Arc::new(DiagnosticCollector::new(Vec::new()));
	let state = AppState::build(raw, &typed, graph, registry, test_config(mode), collector).expect("fixture builds a servable state");
	server::build_router(Arc::new(state))
}

async fn body_json(response: axum::response::Response) -> Value {
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
	serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn exact_route_serves_the_provided_example() {
	let app = build_router(Mode::Strict);
	let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(response.headers().get("x-steady-matched-path").unwrap(), "/health");
	assert_eq!(response.headers().get("x-steady-example-source").unwrap(), "provided");
	assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn parameterized_route_matches_and_validates_the_path_param() {
	let app = build_router(Mode::Strict);

	let ok = app.clone().oneshot(Request::builder().uri("/users/456").body(Body::empty()).unwrap()).await.unwrap();
	assert_eq!(ok.status(), StatusCode::OK);
	assert_eq!(ok.headers().get("x-steady-matched-path").unwrap(), "/users/{id}");

	let bad = app.oneshot(Request::builder().uri("/users/not-a-number").body(Body::empty()).unwrap()).await.unwrap();
	assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
	let body = body_json(bad).await;
	let errors = body["errors"].as_array().unwrap();
	assert!(errors.iter().any(|e| e["path"] == "path.id"));
}

#[tokio::test]
async fn body_validation_rejects_missing_required_property_then_accepts_full_body() {
	let app = build_router(Mode::Strict);

	let incomplete = json!({"name": "Alice"});
	let rejected = app
		.clone()
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/users")
				.header("content-type", "application/json")
				.body(Body::from(incomplete.to_string()))
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
	let body = body_json(rejected).await;
	let errors = body["errors"].as_array().unwrap();
	assert!(errors.iter().any(|e| e["path"].as_str().unwrap().starts_with("body") && e["message"].as_str().unwrap().contains("email")));

	let complete = json!({"name": "Alice", "email": "alice@example.com"});
	let created = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/users")
				.header("content-type", "application/json")
				.body(Body::from(complete.to_string()))
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(created.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn relaxed_mode_header_overrides_a_strict_server_default() {
	let app = build_router(Mode::Strict);
	let response = app
		.oneshot(
			Request::builder()
				.uri("/users/not-a-number")
				.header("x-steady-mode", "relaxed")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(response.headers().get("x-steady-mode").unwrap(), "relaxed");
}

#[tokio::test]
async fn array_size_header_controls_the_generated_item_count() {
	let app = build_router(Mode::Strict);

	let empty = app
		.clone()
		.oneshot(Request::builder().uri("/items").header("x-steady-array-size", "0").body(Body::empty()).unwrap())
		.await
		.unwrap();
	assert_eq!(body_json(empty).await, json!([]));

	let five = app
		.oneshot(Request::builder().uri("/items").header("x-steady-array-size", "5").body(Body::empty()).unwrap())
		.await
		.unwrap();
	let items = body_json(five).await;
	assert_eq!(items.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn self_referential_schema_generation_terminates() {
	let app = build_router(Mode::Strict);
	let response = tokio::time::timeout(
		std::time::Duration::from_secs(5),
		app.oneshot(Request::builder().uri("/tree").body(Body::empty()).unwrap()),
	)
	.await
	.expect("generation must complete within a bounded time budget")
	.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	let body = body_json(response).await;
	assert!(body.is_object());
}

#[tokio::test]
async fn unknown_query_parameter_is_rejected_in_strict_mode() {
	let app = build_router(Mode::Strict);
	let response = app.oneshot(Request::builder().uri("/users?limit=10&unknown=1").body(Body::empty()).unwrap()).await.unwrap();

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	let body = body_json(response).await;
	let errors = body["errors"].as_array().unwrap();
	assert!(errors.iter().any(|e| e["path"] == "query.unknown"));
}
