//! Hook client mode

pub mod run;
