//! External data stores

pub mod model;
pub mod scheduler;
