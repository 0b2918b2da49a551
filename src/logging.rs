//! Structured logging setup and the per-request event helper.
//!
//! Grounded in the teacher's `main.rs`, which installs a `tracing_subscriber`
//! `fmt()` layer with an `EnvFilter` once at startup. The teacher's separate
//! OTLP exporter (`trcng.rs`) is deliberately not carried forward -- it
//! belongs to the service-mesh half of that codebase, not this one -- so
//! this module is the plain sibling of that setup, not a port of it.

use crate::config::LogLevel;

pub fn init(log_level: LogLevel) {
	let default_directive = match log_level {
		LogLevel::Summary => "info",
		LogLevel::Details => "debug",
		LogLevel::Full => "trace",
	};
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

pub struct RequestLogFields<'a> {
	pub method: &'a str,
	pub path: &'a str,
	pub matched_path: Option<&'a str>,
	pub status: u16,
	pub mode: &'a str,
	pub duration_ms: u128,
	pub issue_count: usize,
}

pub fn log_request(fields: RequestLogFields<'_>, log_bodies: bool, request_body: Option<&str>, response_body: Option<&str>) {
	tracing::info!(
		method = fields.method,
		path = fields.path,
		matched_path = fields.matched_path.unwrap_or("-"),
		status = fields.status,
		mode = fields.mode,
		duration_ms = fields.duration_ms as u64,
		issues = fields.issue_count,
		"request completed"
	);
	if log_bodies {
		if let Some(body) = request_body {
			tracing::trace!(body = %truncate(body), "request body");
		}
		if let Some(body) = response_body {
			tracing::trace!(body = %truncate(body), "response body");
		}
	}
}

const BODY_LOG_CAP: usize = 2 * 1024;

fn truncate(body: &str) -> &str {
	if body.len() <= BODY_LOG_CAP {
		return body;
	}
	let mut end = BODY_LOG_CAP;
	while !body.is_char_boundary(end) {
		end -= 1;
	}
	&body[..end]
}

pub fn log_startup_diagnostics(diagnostics: &[crate::diagnostics::Diagnostic]) {
	for diag in diagnostics {
		match diag.severity {
			crate::diagnostics::Severity::Error | crate::diagnostics::Severity::Warning => {
				tracing::warn!(code = %diag.code, pointer = %diag.pointer, "{}", diag.message);
			},
			crate::diagnostics::Severity::Info | crate::diagnostics::Severity::Hint => {
				tracing::info!(code = %diag.code, pointer = %diag.pointer, "{}", diag.message);
			},
		}
	}
}
