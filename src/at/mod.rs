//! AT protocol support: command vocabulary, response parsing, and the
//! blocking command/response exchange used outside the listener loop.

pub mod commands;
pub mod executor;
pub mod parser;

pub use commands::*;
