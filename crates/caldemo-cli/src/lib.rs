//! Command-line front end for the calendar demonstration.

pub mod app;
pub mod cli;
pub mod error;
pub mod settings;
