//! Object types stored and produced by the cno operator.

pub mod config;
pub mod environment;
pub mod limit_range;
pub mod meta;
pub mod namespace;
pub mod quota;
pub mod rbac;
pub mod validate;
