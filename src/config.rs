// src/config.rs

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;

use crate::models::assessment::AssessmentKind;

/// Minimum score (percent) for a result to count as passed.
pub const PASSING_SCORE: i32 = 90;

/// Default and maximum page sizes for question listings.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 50;

/// Upper bound accepted for a reported `time_spent` (one day).
pub const MAX_TIME_SPENT_SECS: i64 = 86_400;

const DEFAULT_TEST_TIME_LIMIT_SECS: u64 = 30 * 60;
const DEFAULT_SESSION_RETENTION_SECS: u64 = 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. When absent the server runs on in-memory storage.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    /// Countdown for timed assessments (tests).
    pub test_time_limit_secs: u64,
    /// How long a completed in-memory session stays readable before it is purged.
    pub session_retention_secs: u64,
}

impl Config {
    /// Log filter directives from `RUST_LOG`. Read before tracing starts, so
    /// that everything `from_env` reports is captured.
    pub fn log_filter() -> String {
        env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
    }

    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let bind_addr = parse_or(
            "BIND_ADDR",
            env::var("BIND_ADDR").ok(),
            SocketAddr::from(([0, 0, 0, 0], 3000)),
        );

        let test_time_limit_secs = parse_or(
            "TEST_TIME_LIMIT_SECS",
            env::var("TEST_TIME_LIMIT_SECS").ok(),
            DEFAULT_TEST_TIME_LIMIT_SECS,
        );
        let session_retention_secs = parse_or(
            "SESSION_RETENTION_SECS",
            env::var("SESSION_RETENTION_SECS").ok(),
            DEFAULT_SESSION_RETENTION_SECS,
        );

        Self {
            database_url,
            jwt_secret,
            bind_addr,
            test_time_limit_secs,
            session_retention_secs,
        }
    }

    /// Configuration suitable for tests: in-memory storage, fixed secret.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            test_time_limit_secs: DEFAULT_TEST_TIME_LIMIT_SECS,
            session_retention_secs: DEFAULT_SESSION_RETENTION_SECS,
        }
    }

    /// Countdown applied to a session of the given kind. Groups are untimed.
    pub fn time_limit_for(&self, kind: AssessmentKind) -> Option<Duration> {
        match kind {
            AssessmentKind::Test if self.test_time_limit_secs > 0 => {
                Some(Duration::from_secs(self.test_time_limit_secs))
            }
            _ => None,
        }
    }
}

/// Parses an optional setting, warning and falling back to `default` when
/// the value is malformed.
fn parse_or<T: FromStr + Display>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}
