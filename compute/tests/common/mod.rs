#![allow(dead_code)]

use std::collections::HashMap;

use envconfig::Envconfig;
use httpmock::MockServer;

use compute::config::Config;
use compute::DisksClient;

pub const PROJECT: &str = "my-project";
pub const ZONE: &str = "us-central1-a";
pub const ACCESS_TOKEN: &str = "ya29.test-token";

/// Path of a zonal disks endpoint, e.g. `disk_path("disk-1/resize")`.
pub fn disk_path(suffix: &str) -> String {
    if suffix.is_empty() {
        format!("/compute/v1/projects/{}/zones/{}/disks", PROJECT, ZONE)
    } else {
        format!(
            "/compute/v1/projects/{}/zones/{}/disks/{}",
            PROJECT, ZONE, suffix
        )
    }
}

pub fn config_for(server: &MockServer, overrides: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = HashMap::from([
        ("COMPUTE_ENDPOINT".to_owned(), server.base_url()),
        ("ACCESS_TOKEN".to_owned(), ACCESS_TOKEN.to_owned()),
        ("REQUEST_TIMEOUT".to_owned(), "5000".to_owned()),
        ("INITIAL_INTERVAL".to_owned(), "1".to_owned()),
        ("MAXIMUM_INTERVAL".to_owned(), "10".to_owned()),
    ]);
    for (key, value) in overrides {
        env.insert(key.to_string(), value.to_string());
    }

    Config::init_from_hashmap(&env).expect("test config is valid")
}

pub fn client_for(server: &MockServer) -> DisksClient {
    DisksClient::new(&config_for(server, &[])).expect("failed to create disks client")
}
