//! Measures and views for the session pool and for GFE latency.
//!
//! Names are stable: exporters publish them as-is and dashboards scrape them.
use crate::tags::{
    TagKey, COMMON_AND_METHOD_TAG_KEYS, COMMON_AND_TYPE_TAG_KEYS, COMMON_TAG_KEYS,
};

/// Prefix shared by every measure name below.
pub const STATS_PREFIX: &str = "cloud.google.com/go/spanner/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Dimensionless,
    Milliseconds,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Dimensionless => "1",
            Unit::Milliseconds => "ms",
        }
    }
}

impl From<Unit> for metrics::Unit {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::Dimensionless => metrics::Unit::Count,
            Unit::Milliseconds => metrics::Unit::Milliseconds,
        }
    }
}

/// A named integer measurement.
#[derive(Debug, PartialEq, Eq)]
pub struct Measure {
    pub name: &'static str,
    pub description: &'static str,
    pub unit: Unit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    LastValue,
    Count,
    /// Bucket boundaries, ascending.
    Distribution(&'static [f64]),
}

/// Binds a measure to an aggregation and the tag keys it is broken down by.
#[derive(Debug, PartialEq)]
pub struct View {
    /// Defaults to the measure name when unset.
    pub name: Option<&'static str>,
    /// Defaults to the measure description when unset.
    pub description: Option<&'static str>,
    pub measure: &'static Measure,
    pub aggregation: Aggregation,
    pub tag_keys: &'static [TagKey],
}

impl View {
    pub fn name(&self) -> &'static str {
        self.name.unwrap_or(self.measure.name)
    }

    pub fn description(&self) -> &'static str {
        self.description.unwrap_or(self.measure.description)
    }
}

pub static OPEN_SESSION_COUNT: Measure = Measure {
    name: "cloud.google.com/go/spanner/open_session_count",
    description: "Number of sessions currently opened",
    unit: Unit::Dimensionless,
};

pub static OPEN_SESSION_COUNT_VIEW: View = View {
    name: None,
    description: None,
    measure: &OPEN_SESSION_COUNT,
    aggregation: Aggregation::LastValue,
    tag_keys: COMMON_TAG_KEYS,
};

pub static MAX_ALLOWED_SESSIONS_COUNT: Measure = Measure {
    name: "cloud.google.com/go/spanner/max_allowed_sessions",
    description: "The maximum number of sessions allowed. Configurable by the user.",
    unit: Unit::Dimensionless,
};

pub static MAX_ALLOWED_SESSIONS_COUNT_VIEW: View = View {
    name: None,
    description: None,
    measure: &MAX_ALLOWED_SESSIONS_COUNT,
    aggregation: Aggregation::LastValue,
    tag_keys: COMMON_TAG_KEYS,
};

/// Sessions in the pool, broken down by the `type` tag.
pub static SESSIONS_COUNT: Measure = Measure {
    name: "cloud.google.com/go/spanner/num_sessions_in_pool",
    description: "The number of sessions currently in use.",
    unit: Unit::Dimensionless,
};

pub static SESSIONS_COUNT_VIEW: View = View {
    name: None,
    description: None,
    measure: &SESSIONS_COUNT,
    aggregation: Aggregation::LastValue,
    tag_keys: COMMON_AND_TYPE_TAG_KEYS,
};

pub static MAX_IN_USE_SESSIONS_COUNT: Measure = Measure {
    name: "cloud.google.com/go/spanner/max_in_use_sessions",
    description: "The maximum number of sessions in use during the last 10 minute interval.",
    unit: Unit::Dimensionless,
};

pub static MAX_IN_USE_SESSIONS_COUNT_VIEW: View = View {
    name: None,
    description: None,
    measure: &MAX_IN_USE_SESSIONS_COUNT,
    aggregation: Aggregation::LastValue,
    tag_keys: COMMON_TAG_KEYS,
};

pub static GET_SESSION_TIMEOUTS_COUNT: Measure = Measure {
    name: "cloud.google.com/go/spanner/get_session_timeouts",
    description: "The number of get sessions timeouts due to pool exhaustion.",
    unit: Unit::Dimensionless,
};

pub static GET_SESSION_TIMEOUTS_COUNT_VIEW: View = View {
    name: None,
    description: None,
    measure: &GET_SESSION_TIMEOUTS_COUNT,
    aggregation: Aggregation::Count,
    tag_keys: COMMON_TAG_KEYS,
};

pub static ACQUIRED_SESSIONS_COUNT: Measure = Measure {
    name: "cloud.google.com/go/spanner/num_acquired_sessions",
    description: "The number of sessions acquired from the session pool.",
    unit: Unit::Dimensionless,
};

pub static ACQUIRED_SESSIONS_COUNT_VIEW: View = View {
    name: None,
    description: None,
    measure: &ACQUIRED_SESSIONS_COUNT,
    aggregation: Aggregation::Count,
    tag_keys: COMMON_TAG_KEYS,
};

pub static RELEASED_SESSIONS_COUNT: Measure = Measure {
    name: "cloud.google.com/go/spanner/num_released_sessions",
    description: "The number of sessions released by the user and pool maintainer.",
    unit: Unit::Dimensionless,
};

pub static RELEASED_SESSIONS_COUNT_VIEW: View = View {
    name: None,
    description: None,
    measure: &RELEASED_SESSIONS_COUNT,
    aggregation: Aggregation::Count,
    tag_keys: COMMON_TAG_KEYS,
};

/// Bucket boundaries, in milliseconds, for the GFE latency distribution.
pub const GFE_LATENCY_BUCKETS: &[f64] = &[
    0.0, 0.01, 0.05, 0.1, 0.3, 0.6, 0.8, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 13.0, 16.0, 20.0,
    25.0, 30.0, 40.0, 50.0, 65.0, 80.0, 100.0, 130.0, 160.0, 200.0, 250.0, 300.0, 400.0, 500.0,
    650.0, 800.0, 1000.0, 2000.0, 5000.0, 10000.0, 20000.0, 50000.0, 100000.0,
];

/// Latency between Google's network receiving an RPC and reading back the first byte of the response.
pub static GFE_LATENCY: Measure = Measure {
    name: "cloud.google.com/go/spanner/gfe_latency",
    description: "Latency between Google's network receiving an RPC and reading back the first byte of the response",
    unit: Unit::Milliseconds,
};

pub static GFE_LATENCY_VIEW: View = View {
    name: Some("cloud.google.com/go/spanner/gfe_latency"),
    description: Some("Latency between Google's network receives an RPC and reads back the first byte of the response"),
    measure: &GFE_LATENCY,
    aggregation: Aggregation::Distribution(GFE_LATENCY_BUCKETS),
    tag_keys: COMMON_AND_METHOD_TAG_KEYS,
};

/// Responses received without a server-timing header; most likely the RPC never reached Google's network.
pub static GFE_HEADER_MISSING_COUNT: Measure = Measure {
    name: "cloud.google.com/go/spanner/gfe_header_missing_count",
    description: "Number of RPC responses received without the server-timing header, most likely means that the RPC never reached Google's network",
    unit: Unit::Dimensionless,
};

pub static GFE_HEADER_MISSING_COUNT_VIEW: View = View {
    name: Some("cloud.google.com/go/spanner/gfe_header_missing_count"),
    description: Some("Number of RPC responses received without the server-timing header, most likely means that the RPC never reached Google's network"),
    measure: &GFE_HEADER_MISSING_COUNT,
    aggregation: Aggregation::Count,
    tag_keys: COMMON_AND_METHOD_TAG_KEYS,
};

/// The views enabled by `Stats::enable_stat_views`.
pub static SESSION_POOL_VIEWS: [&View; 7] = [
    &OPEN_SESSION_COUNT_VIEW,
    &MAX_ALLOWED_SESSIONS_COUNT_VIEW,
    &SESSIONS_COUNT_VIEW,
    &MAX_IN_USE_SESSIONS_COUNT_VIEW,
    &GET_SESSION_TIMEOUTS_COUNT_VIEW,
    &ACQUIRED_SESSIONS_COUNT_VIEW,
    &RELEASED_SESSIONS_COUNT_VIEW,
];
