//! StrokeLab Core: bar domain types, MACD cache, stroke segmentation, signal evaluation.
//!
//! This crate contains:
//! - Domain types (bars, frequencies, stroke direction)
//! - Indicator math (EMA, MACD, sample statistics)
//! - The oscillator cache: MACD values keyed by parameterization and bar id
//! - The incremental stroke analyzer (inclusion merge, fractals, strokes)
//! - Signal rules behind the `SignalEvaluator` trait and a name-keyed registry

pub mod analyze;
pub mod cache;
pub mod domain;
pub mod indicators;
pub mod signal;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types can move across the runner's worker threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Freq>();
        require_sync::<domain::Freq>();

        require_send::<cache::OscillatorCache>();
        require_sync::<cache::OscillatorCache>();

        require_send::<analyze::StrokeAnalyzer>();
        require_sync::<analyze::StrokeAnalyzer>();
        require_send::<analyze::Stroke>();
        require_sync::<analyze::Stroke>();

        require_send::<signal::SignalRecord>();
        require_sync::<signal::SignalRecord>();
        require_send::<signal::DifNearZero>();
        require_sync::<signal::DifNearZero>();
        require_send::<signal::SignalRegistry>();
        require_sync::<signal::SignalRegistry>();
        require_send::<Box<dyn signal::SignalEvaluator>>();
        require_sync::<Box<dyn signal::SignalEvaluator>>();
    }

    /// Signal rules only read the analyzer; the cache is the one thing they mutate.
    #[test]
    fn evaluator_takes_analyzer_by_shared_reference() {
        fn _check_trait_object_builds(
            sig: &dyn signal::SignalEvaluator,
            analyzer: &analyze::StrokeAnalyzer,
            cache: &mut cache::OscillatorCache,
        ) -> signal::SignalRecord {
            sig.evaluate(analyzer, cache)
        }
    }
}
