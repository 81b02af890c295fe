use std::env;

use chrono::Duration;
use rust_decimal::Decimal;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?}, expected compact or json")),
        }
    }
}

/// Tunables of the dispatch engine itself.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub ttl: Duration,
    pub radius_km: f64,
    pub nearby_limit: usize,
    pub offer_page_size: usize,
    pub sweep_interval: std::time::Duration,
    pub commission_rate: Decimal,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(150),
            radius_km: 10.0,
            nearby_limit: 20,
            offer_page_size: 10,
            sweep_interval: std::time::Duration::from_secs(5),
            commission_rate: Decimal::new(30, 2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub dispatch: DispatchSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let defaults = DispatchSettings::default();
        let ttl_secs: i64 = parse_or_default("DISPATCH_TTL_SECS", defaults.ttl.num_seconds())?;
        let sweep_secs: u64 = parse_or_default("SWEEP_INTERVAL_SECS", defaults.sweep_interval.as_secs())?;
        let radius_km: f64 = parse_or_default("DISPATCH_RADIUS_KM", defaults.radius_km)?;
        let commission_rate: Decimal = parse_or_default("COMMISSION_RATE", defaults.commission_rate)?;

        if ttl_secs <= 0 {
            return Err(AppError::Internal("DISPATCH_TTL_SECS must be > 0".to_string()));
        }
        if sweep_secs == 0 {
            return Err(AppError::Internal("SWEEP_INTERVAL_SECS must be > 0".to_string()));
        }
        if !(radius_km.is_finite() && radius_km > 0.0) {
            return Err(AppError::Internal("DISPATCH_RADIUS_KM must be > 0".to_string()));
        }
        if commission_rate < Decimal::ZERO || commission_rate > Decimal::ONE {
            return Err(AppError::Internal("COMMISSION_RATE must be within [0, 1]".to_string()));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 256)?,
            dispatch: DispatchSettings {
                ttl: Duration::seconds(ttl_secs),
                radius_km,
                nearby_limit: parse_or_default("NEARBY_LIMIT", defaults.nearby_limit)?,
                offer_page_size: parse_or_default("OFFER_PAGE_SIZE", defaults.offer_page_size)?,
                sweep_interval: std::time::Duration::from_secs(sweep_secs),
                commission_rate,
            },
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::{DispatchSettings, LogFormat};

    #[test]
    fn defaults_match_dispatch_window() {
        let settings = DispatchSettings::default();
        assert_eq!(settings.ttl.num_seconds(), 150);
        assert_eq!(settings.radius_km, 10.0);
        assert_eq!(settings.nearby_limit, 20);
        assert_eq!(settings.offer_page_size, 10);
        assert_eq!(settings.commission_rate, dec!(0.30));
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
