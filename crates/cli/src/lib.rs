//! # IronNode CLI
//!
//! Library half of the `ironnode` binary.
//!
//! - [`CoreServices`]: dispatcher, worker pool and request logger started
//!   together from a [`contracts::CoreConfig`]
//! - [`simulation`]: simulated nodes and a driver that plays client traffic
//!   through the services

pub mod error;
pub mod services;
pub mod simulation;

pub use error::CliError;
pub use services::{CoreServices, ServicesShutdown};
