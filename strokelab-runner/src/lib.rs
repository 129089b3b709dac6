//! StrokeLab Runner: bar store, resampling, signal replay and export.
//!
//! This crate builds on `strokelab-core` to provide:
//! - A parquet bar store laid out as `{root}/{group}/{symbol}.parquet`
//! - Batch and incremental resampling into coarser frequencies
//! - Seeded synthetic bars for offline runs
//! - Bar-by-bar signal replay with forward-return hit rates, per symbol or
//!   across a group in parallel
//! - CSV and JSON export of replay results
//! - TOML run configuration with a content hash

pub mod config;
pub mod export;
pub mod replay;
pub mod resample;
pub mod store;
pub mod synthetic;

pub use config::{ConfigError, ReplayConfig, RunConfig, StoreConfig};
pub use export::{bars_to_csv, events_to_csv, report_to_json, write_events_csv, write_reports_json};
pub use replay::{
    replay, replay_group, GroupSource, HitRate, LabelCounts, ReplayError, ReplayOptions,
    ReplayReport, SignalEvent,
};
pub use resample::{infer_base_freq, period_end, resample, BarGenerator, ResampleError};
pub use store::{read_parquet_bars, Adjustment, BarStore, StoreError};
pub use synthetic::generate_bars;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn report_types_are_send_sync() {
        assert_send::<ReplayReport>();
        assert_sync::<ReplayReport>();
        assert_send::<SignalEvent>();
        assert_sync::<SignalEvent>();
    }

    #[test]
    fn store_and_config_are_send_sync() {
        assert_send::<BarStore>();
        assert_sync::<BarStore>();
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
        assert_send::<BarGenerator>();
        assert_sync::<BarGenerator>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<ReplayError>();
        assert_sync::<ReplayError>();
        assert_send::<ConfigError>();
        assert_sync::<ConfigError>();
    }
}
