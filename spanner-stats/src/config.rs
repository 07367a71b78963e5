use envconfig::Envconfig;

/// Which session-pool telemetry to turn on at startup.
#[derive(Envconfig, Clone, Debug)]
pub struct StatsConfig {
    #[envconfig(from = "SPANNER_ENABLE_SESSION_METRICS", default = "false")]
    pub enable_session_metrics: bool,

    #[envconfig(from = "SPANNER_ENABLE_GFE_LATENCY", default = "false")]
    pub enable_gfe_latency: bool,

    #[envconfig(from = "SPANNER_ENABLE_GFE_HEADER_MISSING_COUNT", default = "false")]
    pub enable_gfe_header_missing_count: bool,
}
