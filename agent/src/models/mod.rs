//! Domain models

pub mod application;
pub mod deployment;
pub mod event;
pub mod schedule;
