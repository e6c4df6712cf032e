//! pushdeploy library
//!
//! Core modules for the self-hosted git push-to-deploy agent.

pub mod app;
pub mod authn;
pub mod deploy;
pub mod errors;
pub mod events;
pub mod filesys;
pub mod hook;
pub mod hooks;
pub mod http;
pub mod installer;
pub mod logs;
pub mod models;
pub mod release;
pub mod server;
pub mod storage;
pub mod store;
pub mod utils;
pub mod workers;
