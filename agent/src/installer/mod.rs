//! Installation

pub mod install;
