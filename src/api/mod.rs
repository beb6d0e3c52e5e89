//! HTTP API.
//!
//! A thin surface over the session engine: every route only invokes public
//! registry/session operations and renders their results.

mod handlers;
mod server;

pub use server::{ApiServer, ApiState};
