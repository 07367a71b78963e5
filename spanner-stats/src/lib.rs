//! Session-pool telemetry for a Spanner client: measures, views, tags and
//! GFE latency capture from the `server-timing` response header.
pub mod common_tags;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server_timing;
pub mod sink;
pub mod stats;
pub mod tags;
pub mod views;

pub use error::StatsError;
pub use stats::Stats;
