//! List every disk in a zone and print them as JSON.
use envconfig::Envconfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use compute::config::Config;
use compute::requests::ListDisksRequest;
use compute::{ComputeError, DisksClient};

#[derive(Envconfig)]
struct Args {
    pub project: String,

    pub zone: String,

    pub filter: Option<String>,

    #[envconfig(nested = true)]
    pub compute: Config,
}

#[tokio::main]
async fn main() -> Result<(), ComputeError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::init_from_env().expect("Invalid configuration:");

    let mut client = DisksClient::new(&args.compute)?;
    let request = ListDisksRequest {
        project: args.project,
        zone: args.zone,
        filter: args.filter,
        ..Default::default()
    };

    let disks = client.list_all(&request).await?;
    info!(count = disks.len(), zone = %request.zone, "listed disks");

    println!(
        "{}",
        serde_json::to_string_pretty(&disks).map_err(ComputeError::Encode)?
    );

    client.close();

    Ok(())
}
