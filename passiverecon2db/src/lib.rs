//! passiverecon2db library.
//!
//! This library exposes internal modules for integration testing.
//! In production, `passiverecon2db` is used as a binary (main.rs).

pub mod cli;
pub mod error;
pub mod logging;
pub mod run;
pub mod signals;
