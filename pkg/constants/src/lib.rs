//! Centralized constants for the cno operator.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod api;
pub mod controller;
pub mod environment;
pub mod paths;
pub mod state;
