//! State storage for the cno operator: the raw key/value store, its watch
//! stream, a typed versioned object layer and the ownership ledger.

pub mod client;
pub mod error;
pub mod ownership;
pub mod resource;
pub mod watch;
