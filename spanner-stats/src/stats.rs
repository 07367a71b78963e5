use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http::HeaderMap;
use tracing::{debug, instrument, warn};

use crate::common_tags::{CommonTags, SessionClient};
use crate::config::StatsConfig;
use crate::error::StatsError;
use crate::server_timing::parse_gfe_latency;
use crate::sink::MetricsSink;
use crate::tags::{
    TagMap, TAG_KEY_METHOD, TAG_KEY_TYPE, TYPE_NUM_BEING_PREPARED, TYPE_NUM_IN_USE_SESSIONS,
    TYPE_NUM_READ_SESSIONS, TYPE_NUM_WRITE_SESSIONS,
};
use crate::views::{
    Measure, GFE_HEADER_MISSING_COUNT, GFE_HEADER_MISSING_COUNT_VIEW, GFE_LATENCY,
    GFE_LATENCY_VIEW, SESSIONS_COUNT, SESSION_POOL_VIEWS,
};

/// Breakdown of the sessions currently held by a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounts {
    pub in_use: i64,
    pub being_prepared: i64,
    pub read: i64,
    pub write_prepared: i64,
}

/// Session-pool telemetry: owns the metrics sink and the GFE latency switch.
///
/// Build one at startup and share it (usually behind an `Arc`) with whatever
/// intercepts RPC responses.
pub struct Stats {
    sink: Arc<dyn MetricsSink>,
    /// Whether GFE latency and header-missing counts should be captured.
    gfe_latency_metrics_enabled: AtomicBool,
}

impl Stats {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            sink,
            gfe_latency_metrics_enabled: AtomicBool::new(false),
        }
    }

    /// Build a `Stats` and enable the views requested by `config`.
    pub fn from_config(config: &StatsConfig, sink: Arc<dyn MetricsSink>) -> Result<Self, StatsError> {
        let stats = Self::new(sink);

        if config.enable_session_metrics {
            stats.enable_stat_views()?;
        }

        match (
            config.enable_gfe_latency,
            config.enable_gfe_header_missing_count,
        ) {
            (true, true) => stats.enable_gfe_latency_and_header_missing_count_views()?,
            (true, false) => stats.enable_gfe_latency_view()?,
            (false, true) => stats.enable_gfe_header_missing_count_view()?,
            (false, false) => {}
        }

        Ok(stats)
    }

    pub fn sink(&self) -> &Arc<dyn MetricsSink> {
        &self.sink
    }

    /// Enable all views of metrics related to session management.
    pub fn enable_stat_views(&self) -> Result<(), StatsError> {
        debug!("enabling session pool views");
        self.sink.register(&SESSION_POOL_VIEWS)
    }

    pub fn enable_gfe_latency_view(&self) -> Result<(), StatsError> {
        self.set_gfe_latency_metrics_flag(true);
        self.sink.register(&[&GFE_LATENCY_VIEW])
    }

    pub fn enable_gfe_header_missing_count_view(&self) -> Result<(), StatsError> {
        self.set_gfe_latency_metrics_flag(true);
        self.sink.register(&[&GFE_HEADER_MISSING_COUNT_VIEW])
    }

    pub fn enable_gfe_latency_and_header_missing_count_views(&self) -> Result<(), StatsError> {
        self.set_gfe_latency_metrics_flag(true);
        self.sink
            .register(&[&GFE_LATENCY_VIEW, &GFE_HEADER_MISSING_COUNT_VIEW])
    }

    /// Stop capturing GFE metrics. Safe to call when nothing was enabled.
    pub fn disable_gfe_latency_and_header_missing_count_views(&self) {
        self.set_gfe_latency_metrics_flag(false);
        self.sink
            .unregister(&[&GFE_LATENCY_VIEW, &GFE_HEADER_MISSING_COUNT_VIEW]);
    }

    pub fn gfe_latency_metrics_enabled(&self) -> bool {
        self.gfe_latency_metrics_enabled.load(Ordering::Acquire)
    }

    fn set_gfe_latency_metrics_flag(&self, enable: bool) {
        debug!(enable, "setting GFE latency metrics flag");
        self.gfe_latency_metrics_enabled
            .store(enable, Ordering::Release);
    }

    pub fn record_stat(&self, tags: &TagMap, measure: &'static Measure, n: i64) {
        self.sink.record(tags, measure, n);
    }

    /// Record the `num_sessions_in_pool` breakdown, one recording per session type.
    pub fn record_session_counts(
        &self,
        tags: &TagMap,
        counts: SessionCounts,
    ) -> Result<(), StatsError> {
        for (kind, n) in [
            (TYPE_NUM_IN_USE_SESSIONS, counts.in_use),
            (TYPE_NUM_BEING_PREPARED, counts.being_prepared),
            (TYPE_NUM_READ_SESSIONS, counts.read),
            (TYPE_NUM_WRITE_SESSIONS, counts.write_prepared),
        ] {
            let mut typed = tags.clone();
            typed.upsert(TAG_KEY_TYPE, kind)?;
            self.record_stat(&typed, &SESSIONS_COUNT, n);
        }

        Ok(())
    }

    /// Record the GFE latency found in `metadata`, tagged with `method`.
    ///
    /// A missing `server-timing` header is counted on the header-missing
    /// measure and is not an error. A header that is present but malformed
    /// is an error, and nothing is recorded.
    pub fn capture_gfe_latency_stats(
        &self,
        tags: &TagMap,
        metadata: &HeaderMap,
        method: &str,
    ) -> Result<(), StatsError> {
        let gfe_latency = match parse_gfe_latency(metadata)? {
            Some(latency) => latency,
            None => {
                self.record_stat(tags, &GFE_HEADER_MISSING_COUNT, 1);
                return Ok(());
            }
        };

        let mut tags = tags.clone();
        tags.insert(TAG_KEY_METHOD, method)?;
        self.record_stat(&tags, &GFE_LATENCY, gfe_latency);

        Ok(())
    }

    /// Upsert `common` into a context derived from `tags`, then capture the GFE latency.
    pub fn create_context_and_capture_gfe_latency_metrics(
        &self,
        tags: &TagMap,
        common: &CommonTags,
        metadata: &HeaderMap,
        method: &str,
    ) -> Result<(), StatsError> {
        let tags = tags.with_common_tags(common)?;
        self.capture_gfe_latency_stats(&tags, metadata, method)
    }

    /// Capture GFE metrics for a response received by `client`.
    ///
    /// This is meant to be called from an RPC interceptor: failures are
    /// logged and never surface to the caller.
    #[instrument(skip_all, fields(method = %method))]
    pub fn observe_response(&self, client: &SessionClient, metadata: &HeaderMap, method: &str) {
        if !self.gfe_latency_metrics_enabled() {
            return;
        }

        let common = match CommonTags::from_session_client(client) {
            Some(common) => common,
            None => {
                debug!(database = %client.database, "skipping GFE metrics for unparsable database name");
                return;
            }
        };

        if let Err(e) = self.create_context_and_capture_gfe_latency_metrics(
            &TagMap::new(),
            &common,
            metadata,
            method,
        ) {
            warn!("failed to capture GFE latency metrics: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use http::header::HeaderValue;

    use super::*;
    use crate::server_timing::SERVER_TIMING_HEADER;
    use crate::sink::{AggregationData, InMemorySink, Row};
    use crate::tags::{TAG_KEY_CLIENT_ID, TAG_KEY_DATABASE, TAG_KEY_INSTANCE, TAG_KEY_LIB_VERSION};
    use crate::views::{
        Aggregation, View, OPEN_SESSION_COUNT, OPEN_SESSION_COUNT_VIEW, SESSIONS_COUNT_VIEW,
    };

    static COUNTED_GFE_LATENCY_VIEW: View = View {
        name: Some("cloud.google.com/go/spanner/gfe_latency"),
        description: None,
        measure: &GFE_LATENCY,
        aggregation: Aggregation::Count,
        tag_keys: &[],
    };

    fn setup() -> (Arc<InMemorySink>, Stats) {
        let sink = Arc::new(InMemorySink::new());
        let stats = Stats::new(sink.clone());
        (sink, stats)
    }

    fn server_timing(value: &'static str) -> HeaderMap {
        let mut metadata = HeaderMap::new();
        metadata.insert(SERVER_TIMING_HEADER, HeaderValue::from_static(value));
        metadata
    }

    fn latency_values(rows: &[Row]) -> Vec<i64> {
        rows.iter()
            .map(|row| match &row.data {
                AggregationData::Distribution(distribution) => distribution.sum,
                other => panic!("Expected a distribution, got {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_capture_records_latency_with_method_tag() {
        let (sink, stats) = setup();
        stats.enable_gfe_latency_and_header_missing_count_views().unwrap();

        stats
            .capture_gfe_latency_stats(&TagMap::new(), &server_timing("gfet4t7; dur=42"), "Read")
            .unwrap();

        let rows = sink.rows(GFE_LATENCY_VIEW.name());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tags.get(TAG_KEY_METHOD), Some("Read"));
        assert_eq!(latency_values(&rows), vec![42]);
        assert!(sink.rows(GFE_HEADER_MISSING_COUNT_VIEW.name()).is_empty());
    }

    #[test]
    fn test_capture_counts_missing_header() {
        let (sink, stats) = setup();
        stats.enable_gfe_latency_and_header_missing_count_views().unwrap();

        stats
            .capture_gfe_latency_stats(&TagMap::new(), &HeaderMap::new(), "Read")
            .unwrap();

        let rows = sink.rows(GFE_HEADER_MISSING_COUNT_VIEW.name());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].data, AggregationData::Count(1));
        assert!(sink.rows(GFE_LATENCY_VIEW.name()).is_empty());
    }

    #[test]
    fn test_capture_malformed_header_records_nothing() {
        let (sink, stats) = setup();
        stats.enable_gfe_latency_and_header_missing_count_views().unwrap();

        for value in ["foo; dur=42", "gfet4t7; dur=abc", "gfet4t7; dur=4.2"] {
            match stats.capture_gfe_latency_stats(&TagMap::new(), &server_timing(value), "Read") {
                Err(StatsError::Parse(_)) => (),
                other => panic!("Expected a parse error for {:?}, got {:?}", value, other),
            };
        }

        assert!(sink.rows(GFE_LATENCY_VIEW.name()).is_empty());
        assert!(sink.rows(GFE_HEADER_MISSING_COUNT_VIEW.name()).is_empty());
    }

    #[test]
    fn test_capture_keeps_existing_method_tag() {
        let (sink, stats) = setup();
        stats.enable_gfe_latency_view().unwrap();

        let mut tags = TagMap::new();
        tags.upsert(TAG_KEY_METHOD, "BatchCreateSessions").unwrap();
        stats
            .capture_gfe_latency_stats(&tags, &server_timing("gfet4t7; dur=3"), "Read")
            .unwrap();

        let rows = sink.rows(GFE_LATENCY_VIEW.name());
        assert_eq!(rows[0].tags.get(TAG_KEY_METHOD), Some("BatchCreateSessions"));
        // The caller's context is left untouched.
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_common_tags_are_upserted() {
        let (sink, stats) = setup();
        stats.enable_gfe_latency_view().unwrap();

        let common = CommonTags {
            client_id: "client-1".to_owned(),
            database: "db".to_owned(),
            instance: "inst".to_owned(),
            lib_version: "1.2.3".to_owned(),
        };
        let mut tags = TagMap::new();
        tags.upsert(TAG_KEY_DATABASE, "stale").unwrap();

        stats
            .create_context_and_capture_gfe_latency_metrics(
                &tags,
                &common,
                &server_timing("gfet4t7; dur=9"),
                "ExecuteSql",
            )
            .unwrap();

        let row_tags = &sink.rows(GFE_LATENCY_VIEW.name())[0].tags;
        assert_eq!(row_tags.get(TAG_KEY_CLIENT_ID), Some("client-1"));
        assert_eq!(row_tags.get(TAG_KEY_DATABASE), Some("db"));
        assert_eq!(row_tags.get(TAG_KEY_INSTANCE), Some("inst"));
        assert_eq!(row_tags.get(TAG_KEY_LIB_VERSION), Some("1.2.3"));
        assert_eq!(row_tags.get(TAG_KEY_METHOD), Some("ExecuteSql"));
    }

    #[test]
    fn test_enable_and_disable_toggle_flag() {
        let (sink, stats) = setup();
        assert!(!stats.gfe_latency_metrics_enabled());

        stats.enable_gfe_latency_view().unwrap();
        assert!(stats.gfe_latency_metrics_enabled());
        assert!(sink.is_registered(GFE_LATENCY_VIEW.name()));
        assert!(!sink.is_registered(GFE_HEADER_MISSING_COUNT_VIEW.name()));

        stats.disable_gfe_latency_and_header_missing_count_views();
        assert!(!stats.gfe_latency_metrics_enabled());
        stats.disable_gfe_latency_and_header_missing_count_views();
        assert!(!stats.gfe_latency_metrics_enabled());
        assert!(!sink.is_registered(GFE_LATENCY_VIEW.name()));

        stats.enable_gfe_header_missing_count_view().unwrap();
        assert!(stats.gfe_latency_metrics_enabled());
        assert!(sink.is_registered(GFE_HEADER_MISSING_COUNT_VIEW.name()));
    }

    #[test]
    fn test_flag_is_visible_across_threads() {
        let (_, stats) = setup();
        let stats = Arc::new(stats);

        stats.enable_gfe_latency_view().unwrap();
        let reader = stats.clone();
        assert!(std::thread::spawn(move || reader.gfe_latency_metrics_enabled())
            .join()
            .unwrap());

        stats.disable_gfe_latency_and_header_missing_count_views();
        let reader = stats.clone();
        assert!(!std::thread::spawn(move || reader.gfe_latency_metrics_enabled())
            .join()
            .unwrap());
    }

    #[test]
    fn test_enable_stat_views_and_record() {
        let (sink, stats) = setup();
        stats.enable_stat_views().unwrap();
        // Registering the same definitions twice is fine.
        stats.enable_stat_views().unwrap();

        let mut tags = TagMap::new();
        tags.upsert(TAG_KEY_CLIENT_ID, "client-1").unwrap();
        stats.record_stat(&tags, &OPEN_SESSION_COUNT, 25);

        assert_eq!(
            sink.rows(OPEN_SESSION_COUNT_VIEW.name())[0].data,
            AggregationData::LastValue(25)
        );
    }

    #[test]
    fn test_enable_surfaces_conflicting_registration() {
        let (sink, stats) = setup();
        sink.register(&[&COUNTED_GFE_LATENCY_VIEW]).unwrap();

        let expected = Err(StatsError::Registration {
            name: GFE_LATENCY_VIEW.name().to_owned(),
        });
        assert_eq!(stats.enable_gfe_latency_view(), expected);
        assert_eq!(
            stats.enable_gfe_latency_and_header_missing_count_views(),
            expected
        );

        // The batch is rejected as a whole.
        assert!(!sink.is_registered(GFE_HEADER_MISSING_COUNT_VIEW.name()));
        assert!(stats.enable_gfe_header_missing_count_view().is_ok());
    }

    #[test]
    fn test_record_session_counts_by_type() {
        let (sink, stats) = setup();
        stats.enable_stat_views().unwrap();

        stats
            .record_session_counts(
                &TagMap::new(),
                SessionCounts {
                    in_use: 3,
                    being_prepared: 1,
                    read: 5,
                    write_prepared: 2,
                },
            )
            .unwrap();

        let by_type: Vec<(String, AggregationData)> = sink
            .rows(SESSIONS_COUNT_VIEW.name())
            .into_iter()
            .map(|row| (row.tags.get(TAG_KEY_TYPE).unwrap().to_owned(), row.data))
            .collect();

        assert_eq!(
            by_type,
            vec![
                ("num_in_use_sessions".to_owned(), AggregationData::LastValue(3)),
                ("num_read_sessions".to_owned(), AggregationData::LastValue(5)),
                ("num_sessions_being_prepared".to_owned(), AggregationData::LastValue(1)),
                ("num_write_prepared_sessions".to_owned(), AggregationData::LastValue(2)),
            ]
        );
    }

    #[test]
    fn test_observe_response() {
        let (sink, stats) = setup();
        let client = SessionClient {
            id: "client-7".to_owned(),
            database: "projects/p/instances/i/databases/d".to_owned(),
        };

        // Disabled: nothing is captured.
        stats.observe_response(&client, &server_timing("gfet4t7; dur=42"), "Read");
        stats.enable_gfe_latency_and_header_missing_count_views().unwrap();
        assert!(sink.rows(GFE_LATENCY_VIEW.name()).is_empty());

        stats.observe_response(&client, &server_timing("gfet4t7; dur=42"), "Read");
        // Malformed headers are only logged.
        stats.observe_response(&client, &server_timing("foo; dur=42"), "Read");
        stats.observe_response(&client, &HeaderMap::new(), "Commit");

        let rows = sink.rows(GFE_LATENCY_VIEW.name());
        assert_eq!(latency_values(&rows), vec![42]);
        assert_eq!(rows[0].tags.get(TAG_KEY_CLIENT_ID), Some("client-7"));
        assert_eq!(rows[0].tags.get(TAG_KEY_INSTANCE), Some("i"));
        assert_eq!(rows[0].tags.get(TAG_KEY_DATABASE), Some("d"));

        let missing = sink.rows(GFE_HEADER_MISSING_COUNT_VIEW.name());
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].data, AggregationData::Count(1));
    }

    #[test]
    fn test_observe_response_skips_unparsable_database() {
        let (sink, stats) = setup();
        stats.enable_gfe_latency_and_header_missing_count_views().unwrap();

        let client = SessionClient {
            id: "client-1".to_owned(),
            database: "internal".to_owned(),
        };
        stats.observe_response(&client, &HeaderMap::new(), "Read");

        assert!(sink.rows(GFE_HEADER_MISSING_COUNT_VIEW.name()).is_empty());
    }
}
