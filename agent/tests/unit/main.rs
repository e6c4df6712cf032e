//! Integration tests for pushdeploy

mod common;
mod test_auth;
mod test_pipeline;
mod test_queue;
mod test_server;
