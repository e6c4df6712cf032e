//! Release pipeline

pub mod fsm;
pub mod git;
pub mod manifest;
pub mod packages;
pub mod pipeline;
pub mod schedules;
pub mod sink;
pub mod timings;

pub use pipeline::{DeployOptions, DeployOutcome, Deployer};
