//! Filesystem path constants.

// ─── Operator ─────────────────────────────────────────────────────────────

/// Default config file path for the operator.
pub const DEFAULT_OPERATOR_CONFIG: &str = "/etc/cno/config.yaml";

/// Default data directory for the operator state store.
pub const DEFAULT_OPERATOR_DATA_DIR: &str = "/tmp/cno-data";
