use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub default_monthly_target: f64,
    pub evaluation_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        Ok(Self {
            database_url,
            max_connections: env_parse("SALES_OPS_MAX_CONNECTIONS", 5)?,
            default_monthly_target: env_parse("SALES_OPS_DEFAULT_MONTHLY_TARGET", 100_000.0)?,
            evaluation_interval: evaluation_interval(env_parse(
                "SALES_OPS_EVALUATION_INTERVAL_SECS",
                300,
            )?)?,
        })
    }
}

/// Zero is rejected: `tokio::time::interval` panics on a zero period.
pub fn evaluation_interval(secs: u64) -> anyhow::Result<Duration> {
    if secs == 0 {
        anyhow::bail!("evaluation interval must be at least one second");
    }
    Ok(Duration::from_secs(secs))
}

fn env_parse<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_or_default(name, std::env::var(name).ok(), default)
}

fn parse_or_default<T>(name: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{name} has invalid value '{value}': {err}")),
    }
}
