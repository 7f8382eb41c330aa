use anyhow::Result;
use config::Config;

fn default_max_message_bytes() -> usize {
    100 * 1024 * 1024
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FirehoseConfig {
    /// Live endpoint URL, scheme included (http:// or https://)
    pub endpoint: String,

    /// Plaintext channel instead of TLS
    #[serde(default)]
    pub insecure: bool,

    /// Alternate endpoint used for bootstrap fetches, so the live
    /// endpoint's state is untouched; falls back to `endpoint`
    #[serde(default)]
    pub boot_endpoint: Option<String>,

    #[serde(default)]
    pub boot_insecure: bool,

    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl FirehoseConfig {
    pub fn try_load(config: &Config, key: &str) -> Result<Self> {
        Ok(config.get::<Self>(key)?)
    }

    /// Endpoint address and insecure flag for the requested upstream
    pub fn upstream(&self, alternate: bool) -> (&str, bool) {
        match (alternate, &self.boot_endpoint) {
            (true, Some(endpoint)) => (endpoint.as_str(), self.boot_insecure),
            _ => (self.endpoint.as_str(), self.insecure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_from_config_section() {
        let config = Config::builder()
            .add_source(config::File::from_str(
                r#"
                [firehose]
                endpoint = "https://live.example.com:443"
                boot-endpoint = "http://boot.example.com:9000"
                boot-insecure = true
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let cfg = FirehoseConfig::try_load(&config, "firehose").unwrap();
        assert_eq!(cfg.endpoint, "https://live.example.com:443");
        assert!(!cfg.insecure);
        assert_eq!(cfg.max_message_bytes, 100 * 1024 * 1024);

        assert_eq!(
            cfg.upstream(false),
            ("https://live.example.com:443", false)
        );
        assert_eq!(cfg.upstream(true), ("http://boot.example.com:9000", true));
    }

    #[test]
    fn alternate_falls_back_to_live_endpoint() {
        let cfg = FirehoseConfig {
            endpoint: "http://live:1".to_string(),
            insecure: true,
            boot_endpoint: None,
            boot_insecure: false,
            max_message_bytes: 1024,
        };
        assert_eq!(cfg.upstream(true), ("http://live:1", true));
    }
}
