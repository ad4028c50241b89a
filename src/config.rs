use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3002,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional `config` file and
    /// environment variables prefixed `APIREG_` (e.g. `APIREG_SERVER_PORT`).
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&AppConfig::default())?);
        config = config.add_source(config::File::with_name("config").required(false));
        config = config.add_source(
            config::Environment::with_prefix("APIREG")
                .separator("_")
                .prefix_separator("_"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Server bind address.
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
