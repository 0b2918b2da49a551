//! Error types for each module boundary, following the corpus convention of
//! one `thiserror` enum per concern and `anyhow` only at the process edge.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
	#[error("failed to read spec file {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse spec as JSON: {0}")]
	Json(#[from] serde_json::Error),
	#[error("failed to parse spec as YAML: {0}")]
	Yaml(#[from] serde_yaml::Error),
	#[error("remote spec sources are not supported: {0}")]
	RemoteNotSupported(String),
	#[error("spec document is empty")]
	Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum PointerError {
	#[error("invalid pointer syntax: {0}")]
	InvalidSyntax(String),
	#[error("pointer does not resolve: {0}")]
	Unresolved(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
	#[error("invalid path template: {0}")]
	InvalidTemplate(String),
	#[error("duplicate parameter name {name} in template {template}")]
	DuplicateParam { name: String, template: String },
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
	#[error("schema at {0} could not be resolved during generation")]
	UnresolvedSchema(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("bind failed on {host}:{port}: {source}")]
	Bind {
		host: String,
		port: u16,
		#[source]
		source: std::io::Error,
	},
	#[error("no operations are servable after analysis")]
	NoServableOperations,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse config file {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: anyhow::Error,
	},
	#[error("invalid mode value: {0}")]
	InvalidMode(String),
	#[error("invalid log level value: {0}")]
	InvalidLogLevel(String),
}
