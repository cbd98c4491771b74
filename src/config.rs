// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::extract::ExtractRules;
use crate::fetch::FetchConfig;
use crate::rewrite::RewriteConfig;

const ENV_PATH: &str = "FEEDFORGE_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

/// Whole-pipeline configuration. Every field has a default, so a missing
/// config file means default config rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub feed_url: String,
    pub publish_url: String,
    pub fingerprint_log: PathBuf,
    /// When set, the binary polls on this interval instead of running once.
    pub poll_interval_secs: Option<u64>,
    pub fetch: FetchConfig,
    pub extract: ExtractRules,
    pub rewrite: RewriteConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            feed_url: "https://techcrunch.com/feed/".to_string(),
            publish_url: "http://localhost:8000/upload".to_string(),
            fingerprint_log: PathBuf::from("hash-logs.txt"),
            poll_interval_secs: None,
            fetch: FetchConfig::default(),
            extract: ExtractRules::default(),
            rewrite: RewriteConfig::default(),
        }
    }
}

pub fn load_from(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

/// Load config using env var + fallbacks:
/// 1) $FEEDFORGE_CONFIG_PATH
/// 2) config/pipeline.toml
/// 3) built-in defaults
pub fn load_default() -> Result<PipelineConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        } else {
            return Err(anyhow!("FEEDFORGE_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_CONFIG_PATH);
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    Ok(PipelineConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: PipelineConfig = toml::from_str(
            r#"
feed_url = "https://feeds.example.test/rss"

[fetch]
min_delay_secs = 0.0
max_delay_secs = 0.0

[rewrite]
preview_chars = 120
"#,
        )
        .unwrap();
        assert_eq!(cfg.feed_url, "https://feeds.example.test/rss");
        assert_eq!(cfg.publish_url, "http://localhost:8000/upload");
        assert_eq!(cfg.rewrite.preview_chars, 120);
        assert_eq!(cfg.rewrite.model, "command");
        assert_eq!(cfg.fetch.retry.max_attempts, 3);
        assert_eq!(cfg.extract.min_paragraph_chars, 50);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        // Isolate CWD in a temp dir so a real config/ in the repo can't interfere.
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_PATH);

        // No files in the temp CWD: built-in defaults.
        let cfg = load_default().unwrap();
        assert_eq!(cfg.publish_url, "http://localhost:8000/upload");

        // Env path takes precedence.
        let p = tmp.path().join("pipeline.toml");
        fs::write(&p, r#"publish_url = "http://localhost:9999/upload""#).unwrap();
        env::set_var(ENV_PATH, p.display().to_string());
        let cfg2 = load_default().unwrap();
        assert_eq!(cfg2.publish_url, "http://localhost:9999/upload");
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
