//! `covid-dash` library crate.
//!
//! The binary (`covid-dash`) is a thin wrapper around this library so that:
//!
//! - the pipeline is testable without spawning processes or touching the network
//! - a presentation layer can call `app::pipeline` directly and consume the payload

pub mod aggregate;
pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod logging;
pub mod report;
