//! Built-in static analyzers. Each is a small struct implementing
//! [`crate::diagnostics::Analyzer`]; `default_analyzers()` is the set run at
//! startup.

mod cycles;
mod deep_chains;
mod quality;
mod readiness;
mod unresolved;

use crate::diagnostics::Analyzer;

pub fn default_analyzers() -> Vec<Box<dyn Analyzer>> {
	vec![
		Box::new(unresolved::UnresolvedRefAnalyzer),
		Box::new(cycles::CycleAnalyzer),
		Box::new(deep_chains::DeepChainAnalyzer::default()),
		Box::new(quality::SchemaQualityAnalyzer::default()),
		Box::new(readiness::MockReadinessAnalyzer),
	]
}
