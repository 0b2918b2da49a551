//! Diagnostic data model and the per-server diagnostic collector.
//!
//! The collector is an ordinary struct constructed by the caller and shared
//! via `Arc`, never a process-wide static — the design note this repo works
//! from explicitly calls out construction-time injection in place of a
//! global "get or create" accessor, which would otherwise make parallel
//! test servers cross-talk.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Error,
	Warning,
	Info,
	Hint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributionKind {
	Spec,
	Sdk,
	Server,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attribution {
	#[serde(rename = "type")]
	pub kind: AttributionKind,
	pub confidence: f32,
	pub reasoning: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
	pub code: String,
	pub severity: Severity,
	pub pointer: String,
	pub message: String,
	pub attribution: Attribution,
	pub suggestion: Option<String>,
	pub related: Vec<String>,
}

/// A request-level issue. Pure data: the caller decides what to do about it.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
	pub path: String,
	pub message: String,
	pub expected: Option<String>,
	pub actual: Option<String>,
}

impl ValidationIssue {
	pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
		ValidationIssue {
			path: path.into(),
			message: message.into(),
			expected: None,
			actual: None,
		}
	}

	pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
		self.expected = Some(expected.into());
		self
	}

	pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
		self.actual = Some(actual.into());
		self
	}
}

/// Implemented by each static analyzer. Kept as a trait-object family
/// (`Vec<Box<dyn Analyzer>>`) rather than an inheritance hierarchy, per the
/// design note preferring dynamic dispatch for this kind of small
/// polymorphic interface.
pub trait Analyzer: Send + Sync {
	fn name(&self) -> &'static str;
	fn codes(&self) -> &'static [&'static str];
	fn analyze(
		&self,
		registry: &crate::registry::SchemaRegistry,
		graph: &crate::refgraph::RefGraph,
	) -> Vec<Diagnostic>;
}

pub fn run_analyzers(
	analyzers: &[Box<dyn Analyzer>],
	registry: &crate::registry::SchemaRegistry,
	graph: &crate::refgraph::RefGraph,
) -> Vec<Diagnostic> {
	let mut all = Vec::new();
	for analyzer in analyzers {
		// Analyzers must never unwind across this call; since everything
		// here is hand-rolled over serde_json::Value, a panic would
		// indicate a bug in the analyzer itself rather than bad input, so
		// catch_unwind converts that into a server-attributed diagnostic
		// instead of taking the whole startup sequence down.
		let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
			analyzer.analyze(registry, graph)
		}));
		match result {
			Ok(diagnostics) => all.extend(diagnostics),
			Err(_) => all.push(Diagnostic {
				code: "analyzer-panic".to_string(),
				severity: Severity::Warning,
				pointer: "#".to_string(),
				message: format!("analyzer '{}' failed unexpectedly", analyzer.name()),
				attribution: Attribution {
					kind: AttributionKind::Server,
					confidence: 1.0,
					reasoning: "analyzer raised a panic instead of returning diagnostics".to_string(),
				},
				suggestion: None,
				related: Vec::new(),
			}),
		}
	}
	all.sort_by_key(|d| d.severity);
	all
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
	pub request_count: u64,
	pub success_count: u64,
	pub failed_count: u64,
	pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsSummary {
	pub static_diagnostics: Vec<Diagnostic>,
	pub runtime_diagnostics_count: usize,
	pub top_codes: Vec<(String, usize, String)>,
	pub stats: SessionStats,
}

struct CollectorState {
	runtime: Vec<Diagnostic>,
	request_count: u64,
	success_count: u64,
	failed_count: u64,
}

/// Aggregates static (startup) diagnostics and a growing list of runtime
/// diagnostics across a server's lifetime. Scoped to one server instance.
pub struct DiagnosticCollector {
	static_diagnostics: Vec<Diagnostic>,
	started_at: Instant,
	state: Mutex<CollectorState>,
}

impl DiagnosticCollector {
	pub fn new(static_diagnostics: Vec<Diagnostic>) -> Self {
		DiagnosticCollector {
			static_diagnostics,
			started_at: Instant::now(),
			state: Mutex::new(CollectorState {
				runtime: Vec::new(),
				request_count: 0,
				success_count: 0,
				failed_count: 0,
			}),
		}
	}

	pub fn static_diagnostics(&self) -> &[Diagnostic] {
		&self.static_diagnostics
	}

	/// Records one request's outcome. Counter increments and the list
	/// append happen under a single lock acquisition so summary readers
	/// always observe a coherent snapshot.
	pub fn record(&self, diagnostics: Vec<Diagnostic>, success: bool) {
		let mut state = self.state.lock().unwrap();
		state.request_count += 1;
		if success {
			state.success_count += 1;
		} else {
			state.failed_count += 1;
		}
		state.runtime.extend(diagnostics);
	}

	pub fn summary(&self) -> DiagnosticsSummary {
		let state = self.state.lock().unwrap();
		let mut counts: HashMap<&str, (usize, String)> = HashMap::new();
		for d in &state.runtime {
			let entry = counts
				.entry(d.code.as_str())
				.or_insert((0, d.message.clone()));
			entry.0 += 1;
		}
		let mut top_codes: Vec<(String, usize, String)> = counts
			.into_iter()
			.map(|(code, (count, example))| (code.to_string(), count, example))
			.collect();
		top_codes.sort_by(|a, b| b.1.cmp(&a.1));
		top_codes.truncate(10);

		DiagnosticsSummary {
			static_diagnostics: self.static_diagnostics.clone(),
			runtime_diagnostics_count: state.runtime.len(),
			top_codes,
			stats: SessionStats {
				request_count: state.request_count,
				success_count: state.success_count,
				failed_count: state.failed_count,
				duration_ms: self.started_at.elapsed().as_millis(),
			},
		}
	}

	/// Test-only hook: clears runtime state without touching the static
	/// diagnostics, so a test can assert per-scenario counters in isolation.
	#[cfg(test)]
	pub fn reset_runtime(&self) {
		let mut state = self.state.lock().unwrap();
		state.runtime.clear();
		state.request_count = 0;
		state.success_count = 0;
		state.failed_count = 0;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_diag(code: &str) -> Diagnostic {
		Diagnostic {
			code: code.to_string(),
			severity: Severity::Warning,
			pointer: "#".to_string(),
			message: "sample".to_string(),
			attribution: Attribution {
				kind: AttributionKind::Spec,
				confidence: 0.5,
				reasoning: "test".to_string(),
			},
			suggestion: None,
			related: Vec::new(),
		}
	}

	#[test]
	fn records_counters_and_summary() {
		let collector = DiagnosticCollector::new(vec![sample_diag("startup-x")]);
		collector.record(vec![sample_diag("unknown-param")], true);
		collector.record(Vec::new(), false);
		let summary = collector.summary();
		assert_eq!(summary.stats.request_count, 2);
		assert_eq!(summary.stats.success_count, 1);
		assert_eq!(summary.stats.failed_count, 1);
		assert_eq!(summary.runtime_diagnostics_count, 1);
		assert_eq!(summary.static_diagnostics.len(), 1);
	}

	#[test]
	fn reset_runtime_clears_counters_not_static() {
		let collector = DiagnosticCollector::new(vec![sample_diag("startup-x")]);
		collector.record(vec![sample_diag("a")], true);
		collector.reset_runtime();
		let summary = collector.summary();
		assert_eq!(summary.stats.request_count, 0);
		assert_eq!(summary.static_diagnostics.len(), 1);
	}
}
