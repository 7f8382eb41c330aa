use anyhow::Result;
use config::Config;

fn default_start_block() -> u64 {
    1
}

fn default_prune_interval() -> u64 {
    1000
}

fn default_pruning_cutoff() -> u64 {
    7200 // one hour worth of blocks
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IngestorConfig {
    /// Bootstrap sync height; absent disables bootstrapping
    #[serde(default)]
    pub sync_height: Option<u64>,

    /// Start height when the status store holds no resume cursor
    #[serde(default = "default_start_block")]
    pub default_start_block: u64,

    /// Prune once per this many irreversible heights
    #[serde(default = "default_prune_interval")]
    pub prune_interval: u64,

    /// How far behind head the bootstrap sync height is expected to sit
    #[serde(default = "default_pruning_cutoff")]
    pub pruning_cutoff: u64,

    /// Wait between a stream failure and the reconnect attempt
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            sync_height: None,
            default_start_block: default_start_block(),
            prune_interval: default_prune_interval(),
            pruning_cutoff: default_pruning_cutoff(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl IngestorConfig {
    pub fn try_load(config: &Config, key: &str) -> Result<Self> {
        match config.get::<Self>(key) {
            Ok(cfg) => Ok(cfg),
            Err(config::ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_when_section_missing() {
        let config = Config::builder().build().unwrap();
        let cfg = IngestorConfig::try_load(&config, "ingestor").unwrap();
        assert_eq!(cfg.sync_height, None);
        assert_eq!(cfg.default_start_block, 1);
        assert_eq!(cfg.prune_interval, 1000);
        assert_eq!(cfg.pruning_cutoff, 7200);
        assert_eq!(cfg.reconnect_delay_ms, 5000);
    }

    #[test]
    fn loads_overrides_from_section() {
        let config = Config::builder()
            .add_source(config::File::from_str(
                r#"
                [ingestor]
                sync-height = 150000000
                prune-interval = 500
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let cfg = IngestorConfig::try_load(&config, "ingestor").unwrap();
        assert_eq!(cfg.sync_height, Some(150_000_000));
        assert_eq!(cfg.prune_interval, 500);
        assert_eq!(cfg.pruning_cutoff, 7200);
    }
}
