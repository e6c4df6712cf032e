//! Release storage

pub mod cache;
pub mod store;
