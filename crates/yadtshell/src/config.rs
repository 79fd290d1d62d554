use std::path::{Path, PathBuf};

use serde::Deserialize;

/// The fleet definition loaded from `--config` (default `yadtshell.yaml`).
///
/// This is the Rust-native stand-in for the original's target directory:
/// a flat, versioned file naming the hosts in scope and where the
/// controller publishes its view of them.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Short hostnames to probe.
    pub hosts: Vec<String>,
    /// `host:port` of the broadcast service, if one is configured. When
    /// absent, ignored-status checks always report "not ignored" and
    /// full-update notifications are only logged.
    #[serde(default)]
    pub broadcast_base: Option<String>,
    /// Where the status pipeline persists its snapshot and per-host data.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    /// Where raw per-host probe stdout is written.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("target/yadt")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("target/yadt/yadtshell.log")
}

impl TargetConfig {
    /// Load and parse a target config from `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading target config {}: {e}", path.display()))?;
        let config: TargetConfig = serde_yaml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing target config {}: {e}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yadtshell.yaml");
        std::fs::write(&path, "hosts:\n  - it01\n  - it02\n").unwrap();

        let config = TargetConfig::load(&path).unwrap();
        assert_eq!(config.hosts, vec!["it01".to_string(), "it02".to_string()]);
        assert!(config.broadcast_base.is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = TargetConfig::load(Path::new("/nonexistent/yadtshell.yaml")).unwrap_err();
        assert!(err.to_string().contains("reading target config"));
    }
}
