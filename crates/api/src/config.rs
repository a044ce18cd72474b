//! Application configuration loaded from environment variables.

use common::Money;
use domain::{CartSettings, CheckoutSettings};

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for structured output, anything else for text
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs in memory
/// - `SHIPPING_FEE_CENTS`: flat delivery fee (default: `5000`)
/// - `ORDER_NUMBER_PREFIX`: order number prefix (default: `"ORD"`)
/// - `PICKUP_CITY`: city recorded on pickup orders (default: `"Store"`)
/// - `CHECKOUT_MAX_ATTEMPTS`: order numbers tried per checkout (default: `3`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub shipping_fee: Money,
    pub order_number_prefix: String,
    pub pickup_city: String,
    pub checkout_max_attempts: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse(&var, "PORT", "a port number")?.unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match var("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            database_url: var("DATABASE_URL"),
            shipping_fee: parse::<i64, _>(&var, "SHIPPING_FEE_CENTS", "a number of cents")?
                .map(Money::from_cents)
                .unwrap_or(defaults.shipping_fee),
            order_number_prefix: var("ORDER_NUMBER_PREFIX")
                .unwrap_or(defaults.order_number_prefix),
            pickup_city: var("PICKUP_CITY").unwrap_or(defaults.pickup_city),
            checkout_max_attempts: parse(&var, "CHECKOUT_MAX_ATTEMPTS", "a positive integer")?
                .filter(|&n: &u32| n > 0)
                .unwrap_or(defaults.checkout_max_attempts),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cart_settings(&self) -> CartSettings {
        CartSettings {
            shipping_fee: self.shipping_fee,
        }
    }

    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            shipping_fee: self.shipping_fee,
            order_number_prefix: self.order_number_prefix.clone(),
            pickup_city: self.pickup_city.clone(),
            max_attempts: self.checkout_max_attempts,
        }
    }
}

fn parse<T, F>(
    var: &F,
    name: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::Invalid {
                name,
                expected,
                value,
            })
        })
        .transpose()
}

impl Default for Config {
    fn default() -> Self {
        let checkout = CheckoutSettings::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            shipping_fee: checkout.shipping_fee,
            order_number_prefix: checkout.order_number_prefix,
            pickup_city: checkout.pickup_city,
            checkout_max_attempts: checkout.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert_eq!(config.shipping_fee, Money::from_cents(5000));
        assert_eq!(config.order_number_prefix, "ORD");
        assert_eq!(config.checkout_max_attempts, 3);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_reads_overrides() {
        let config = from_pairs(&[
            ("PORT", "8081"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("SHIPPING_FEE_CENTS", "1250"),
            ("ORDER_NUMBER_PREFIX", "WEB"),
            ("PICKUP_CITY", "Medellín"),
            ("CHECKOUT_MAX_ATTEMPTS", "5"),
        ])
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/shop"));

        let checkout = config.checkout_settings();
        assert_eq!(checkout.shipping_fee, Money::from_cents(1250));
        assert_eq!(checkout.order_number_prefix, "WEB");
        assert_eq!(checkout.pickup_city, "Medellín");
        assert_eq!(checkout.max_attempts, 5);
        assert_eq!(config.cart_settings().shipping_fee, Money::from_cents(1250));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config =
            from_pairs(&[("DATABASE_URL", "  "), ("CHECKOUT_MAX_ATTEMPTS", "0")]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.checkout_max_attempts, 3);
    }

    #[test]
    fn test_rejects_malformed_numbers() {
        let err = from_pairs(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
        assert!(from_pairs(&[("SHIPPING_FEE_CENTS", "12.50")]).is_err());
    }
}
