//! Core modules: shared primitives the guard subsystems build on.

pub mod config;
pub mod error;
pub mod output;
pub mod pattern;
pub mod project;
pub mod store;
pub mod time;
pub mod trace;
