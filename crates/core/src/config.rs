use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub feed: FeedConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_minutes: i64,
    /// Lets the token endpoint mint admin tokens without an existing
    /// admin bearer. Development convenience only.
    pub allow_admin_tokens: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub symbols: Vec<String>,
    pub tick_interval_ms: u64,
    /// Starting price per symbol, position-matched with `symbols`.
    pub start_prices: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval of the due-trade recovery sweep, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/binopt".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                jwt_secret: "change-me".to_string(),
                token_expiry_minutes: 60,
                allow_admin_tokens: false,
            },
            feed: FeedConfig {
                symbols: vec![
                    "BTCUSDT".to_string(),
                    "ETHUSDT".to_string(),
                    "SOLUSDT".to_string(),
                ],
                tick_interval_ms: 1000,
                start_prices: vec![50000.0, 2500.0, 150.0],
            },
            engine: EngineConfig {
                sweep_interval_secs: 5,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pair_every_symbol_with_a_start_price() {
        let config = AppConfig::default();
        assert_eq!(config.feed.symbols.len(), config.feed.start_prices.len());
        assert!(config.engine.sweep_interval_secs > 0);
    }

    #[test]
    fn admin_token_minting_is_off_by_default() {
        assert!(!AppConfig::default().auth.allow_admin_tokens);
    }
}
