//! Repository hooks

pub mod installer;

pub use installer::{HookInstaller, HookOutcome};
