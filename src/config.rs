use std::time::Duration;

use crate::gemini_client::{DEFAULT_MAX_RETRIES, DEFAULT_MODEL_TIMEOUT};
use crate::pricing::{DisplayCurrency, PricingConfig};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub model_timeout: Duration,
    pub model_max_retries: u32,
    pub pricing: PricingConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_vars(|key| std::env::var(key).ok())?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!(
            "Gemini model: {} at {}",
            config.gemini_model,
            config.gemini_base_url
        );
        tracing::debug!(
            "Model timeout: {:?}, max retries: {}",
            config.model_timeout,
            config.model_max_retries
        );
        tracing::debug!(
            "Display currency: {:?} at rate {}",
            config.pricing.currency,
            config.pricing.usd_rate
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Builds the configuration from a variable lookup, validating every value.
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = var("DATABASE_URL")
            .or_else(|| var("DB_URL"))
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required"))
            .and_then(|url| {
                if url.trim().is_empty() {
                    anyhow::bail!("DATABASE_URL cannot be empty");
                }
                if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                    anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                }
                Ok(url)
            })?;

        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?;

        let gemini_api_key = var("GEMINI_API_KEY")
            .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY environment variable required"))
            .and_then(|key| {
                if key.trim().is_empty() {
                    anyhow::bail!("GEMINI_API_KEY cannot be empty");
                }
                Ok(key)
            })?;

        let gemini_model = var("GEMINI_MODEL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let gemini_base_url = var("GEMINI_BASE_URL")
            .filter(|s| !s.trim().is_empty())
            .map(|url| {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    anyhow::bail!("GEMINI_BASE_URL must start with http:// or https://");
                }
                Ok(url)
            })
            .transpose()?
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());

        let model_timeout = match var("MODEL_TIMEOUT_SECS") {
            Some(secs) => {
                let secs: u64 = secs
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("MODEL_TIMEOUT_SECS must be a whole number"))?;
                if secs == 0 {
                    anyhow::bail!("MODEL_TIMEOUT_SECS must be greater than 0");
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_MODEL_TIMEOUT,
        };

        let model_max_retries = match var("MODEL_MAX_RETRIES") {
            Some(n) => n
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("MODEL_MAX_RETRIES must be a whole number"))?,
            None => DEFAULT_MAX_RETRIES,
        };

        let currency = match var("DISPLAY_CURRENCY") {
            Some(code) => DisplayCurrency::parse(&code)
                .ok_or_else(|| anyhow::anyhow!("DISPLAY_CURRENCY must be USD or INR"))?,
            None => DisplayCurrency::Usd,
        };

        let usd_rate = var("USD_TO_DISPLAY_RATE")
            .map(|rate| {
                let rate: f64 = rate
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("USD_TO_DISPLAY_RATE must be a number"))?;
                if !rate.is_finite() || rate <= 0.0 {
                    anyhow::bail!("USD_TO_DISPLAY_RATE must be positive");
                }
                Ok(rate)
            })
            .transpose()?;

        Ok(Self {
            database_url,
            port,
            gemini_api_key,
            gemini_model,
            gemini_base_url,
            model_timeout,
            model_max_retries,
            pricing: PricingConfig::new(currency, usd_rate),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/autovolt"),
        ("GEMINI_API_KEY", "test-key"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = Config::from_vars(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.gemini_model, "gemini-1.5-flash");
        assert_eq!(config.gemini_base_url, DEFAULT_GEMINI_BASE_URL);
        assert_eq!(config.model_timeout, Duration::from_secs(30));
        assert_eq!(config.model_max_retries, 2);
        assert_eq!(config.pricing, PricingConfig::default());
    }

    #[test]
    fn legacy_db_url_is_accepted() {
        let config = Config::from_vars(lookup(&[
            ("DB_URL", "postgresql://db/cars"),
            ("GEMINI_API_KEY", "k"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "postgresql://db/cars");
    }

    #[test]
    fn inr_uses_default_rate_unless_overridden() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("DISPLAY_CURRENCY", "inr"));
        let config = Config::from_vars(lookup(&vars)).unwrap();
        assert_eq!(config.pricing.currency, DisplayCurrency::Inr);
        assert_eq!(config.pricing.usd_rate, 83.0);

        vars.push(("USD_TO_DISPLAY_RATE", "84.5"));
        let config = Config::from_vars(lookup(&vars)).unwrap();
        assert_eq!(config.pricing.usd_rate, 84.5);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(Config::from_vars(lookup(&[("GEMINI_API_KEY", "k")])).is_err());
        assert!(Config::from_vars(lookup(&[
            ("DATABASE_URL", "mysql://db"),
            ("GEMINI_API_KEY", "k")
        ]))
        .is_err());

        for (key, value) in [
            ("PORT", "http"),
            ("MODEL_TIMEOUT_SECS", "0"),
            ("MODEL_MAX_RETRIES", "-1"),
            ("DISPLAY_CURRENCY", "EUR"),
            ("USD_TO_DISPLAY_RATE", "-3"),
            ("GEMINI_BASE_URL", "ftp://example.com"),
            ("GEMINI_API_KEY", "  "),
        ] {
            let mut vars = REQUIRED.to_vec();
            vars.retain(|(k, _)| *k != key);
            vars.push((key, value));
            assert!(
                Config::from_vars(lookup(&vars)).is_err(),
                "{key}={value} should be rejected"
            );
        }
    }
}
