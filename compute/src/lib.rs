pub mod config;
pub mod disks;
pub mod error;
pub mod requests;
pub mod rest;
pub mod retry;
pub mod types;

pub use disks::{CallSettings, DisksApi, DisksCallOptions, DisksClient};
pub use error::ComputeError;
pub use rest::DisksRestClient;
