//! Push authentication and authorization

pub mod gate;
pub mod password;
pub mod push;
