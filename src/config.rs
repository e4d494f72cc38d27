use std::env;
use std::net::SocketAddr;

use anyhow::{Context as _, Result};

/// Runtime configuration, read once at startup from the environment
/// (`.env` is loaded by `main` via dotenvy before this runs).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    /// Minimum number of days before check-in that a non-admin may still
    /// cancel a booking.
    pub booking_cancel_deadline_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .context("BIND_ADDR must be a socket address")?;

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        let access_token_ttl_secs = parse_or("ACCESS_TOKEN_TTL_SECS", 15 * 60)?;
        let refresh_token_ttl_secs = parse_or("REFRESH_TOKEN_TTL_SECS", 7 * 24 * 3600)?;
        let booking_cancel_deadline_days = parse_or("BOOKING_CANCEL_DEADLINE_DAYS", 1)?;

        Ok(Config {
            database_url,
            bind_addr,
            jwt_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            booking_cancel_deadline_days,
        })
    }
}

fn parse_or(key: &str, default: i64) -> Result<i64> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be an integer, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
