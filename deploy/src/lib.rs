pub mod artifact;
pub mod chain;
pub mod config;
pub mod deployer;
pub mod error;
pub mod fixture;
pub mod record;
pub mod shared;
pub mod telemetry;
pub mod units;
