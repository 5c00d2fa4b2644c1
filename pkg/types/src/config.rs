use serde::{Deserialize, Serialize};

/// Operator configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// port: 8080
/// data-dir: /var/lib/cno/data
/// token: my-secret-token
/// workers: 4
/// resync-secs: 300
/// log-format: json
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorConfigFile {
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default, alias = "resync-secs")]
    pub resync_secs: Option<u64>,
    #[serde(default, alias = "log-format")]
    pub log_format: Option<LogFormat>,
    #[serde(default, alias = "in-memory")]
    pub in_memory: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}
