use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};

use crate::views::GFE_LATENCY_BUCKETS;

/// Exported names are sanitized (`cloud_google_com_go_spanner_gfe_latency`), so match on the suffix.
const GFE_LATENCY_SUFFIX: &str = "gfe_latency";

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Suffix(GFE_LATENCY_SUFFIX.to_owned()),
        GFE_LATENCY_BUCKETS,
    )
}

/// Build a Prometheus recorder using the GFE latency buckets, without installing it.
pub fn build_metrics_recorder() -> Result<PrometheusRecorder, BuildError> {
    Ok(builder()?.build_recorder())
}

/// Install a Prometheus recorder as the global `metrics` recorder.
/// The returned handle renders the scrape payload; pair it with a `RecorderSink`.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::HeaderMap;

    use super::*;
    use crate::common_tags::SessionClient;
    use crate::sink::RecorderSink;
    use crate::stats::Stats;

    #[test]
    fn test_gfe_latency_is_rendered_as_histogram() {
        let recorder = build_metrics_recorder().unwrap();
        let handle = recorder.handle();
        let stats = Stats::new(Arc::new(RecorderSink::new()));

        let mut metadata = HeaderMap::new();
        metadata.insert("server-timing", "gfet4t7; dur=42".parse().unwrap());
        let client = SessionClient {
            id: "client-1".to_owned(),
            database: "projects/p/instances/i/databases/d".to_owned(),
        };

        metrics::with_local_recorder(&recorder, || {
            stats
                .enable_gfe_latency_and_header_missing_count_views()
                .unwrap();
            stats.observe_response(&client, &metadata, "Read");
        });

        let rendered = handle.render();
        assert!(rendered.contains("spanner_gfe_latency_bucket"));
        assert!(rendered.contains("grpc_client_method=\"Read\""));
        assert!(rendered.contains("client_id=\"client-1\""));
    }
}
