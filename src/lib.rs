//! An OpenAPI mock server: loads a spec, compiles its routes and schemas
//! once at startup, then serves synthetic, schema-conformant responses while
//! validating each request against the same document.

pub mod analyzers;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod generator;
pub mod logging;
pub mod pointer;
pub mod refgraph;
pub mod registry;
pub mod routing;
pub mod server;
pub mod validator;
