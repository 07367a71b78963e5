use anyhow::Result;
use httpmock::prelude::*;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::json;

use compute::requests::GetDiskRequest;

use crate::common::*;
mod common;

fn get_disk(disk: &str) -> GetDiskRequest {
    GetDiskRequest {
        project: PROJECT.to_owned(),
        zone: ZONE.to_owned(),
        disk: disk.to_owned(),
    }
}

#[test]
fn it_counts_requests_by_operation_and_status() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(disk_path("disk-1"));
        then.status(200).json_body(json!({"name": "disk-1"}));
    });
    server.mock(|when, then| {
        when.method(GET).path(disk_path("missing"));
        then.status(404);
    });

    let client = client_for(&server);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        runtime.block_on(async {
            client.get(&get_disk("disk-1")).await?;
            client.get(&get_disk("disk-1")).await?;
            assert!(client.get(&get_disk("missing")).await.is_err());
            Ok::<_, compute::ComputeError>(())
        })
    })?;

    let mut counters = Vec::new();
    let mut durations = 0;
    for (key, _, _, value) in snapshotter.snapshot().into_vec() {
        let mut labels: Vec<(String, String)> = key
            .key()
            .labels()
            .map(|l| (l.key().to_owned(), l.value().to_owned()))
            .collect();
        labels.sort();

        match (key.key().name(), value) {
            ("compute_requests_total", DebugValue::Counter(count)) => {
                counters.push((labels, count))
            }
            ("compute_request_duration_seconds", DebugValue::Histogram(values)) => {
                durations += values.len()
            }
            (name, value) => panic!("Unexpected metric {} = {:?}", name, value),
        }
    }
    counters.sort();

    let labels = |status: &str| {
        vec![
            ("operation".to_owned(), "get".to_owned()),
            ("status".to_owned(), status.to_owned()),
        ]
    };
    assert_eq!(counters, vec![(labels("200"), 2), (labels("404"), 1)]);
    assert_eq!(durations, 3);

    Ok(())
}
