// Runtime configuration loaded from the environment (and `.env` via dotenv)

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{name} must be greater than zero")]
    NotPositive { name: &'static str },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Absent means the in-memory store is used
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database_max_connections: u32,
    pub services: ServiceSettings,
    pub jobs: JobSettings,
}

/// Tunables consumed by the domain services
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    /// Default window a notified waitlist client has to convert the offer
    pub waitlist_offer_hours: i64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            waitlist_offer_hours: 24,
        }
    }
}

/// Poll intervals of the background jobs
#[derive(Debug, Clone, Copy)]
pub struct JobSettings {
    pub reminder_poll: Duration,
    pub recurring_poll: Duration,
    pub waitlist_sweep: Duration,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            reminder_poll: Duration::from_secs(60),
            recurring_poll: Duration::from_secs(3600),
            waitlist_sweep: Duration::from_secs(300),
        }
    }
}

impl AppConfig {
    /// Read configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 8080u16, "port number")?;
        let database_max_connections =
            positive(parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5u32, "integer")?, "DATABASE_MAX_CONNECTIONS")?;

        let waitlist_offer_hours = parse_or(&lookup, "WAITLIST_OFFER_HOURS", 24i64, "integer")?;
        if waitlist_offer_hours <= 0 {
            return Err(ConfigError::NotPositive {
                name: "WAITLIST_OFFER_HOURS",
            });
        }

        let jobs = JobSettings {
            reminder_poll: seconds(&lookup, "REMINDER_POLL_SECS", 60)?,
            recurring_poll: seconds(&lookup, "RECURRING_POLL_SECS", 3600)?,
            waitlist_sweep: seconds(&lookup, "WAITLIST_SWEEP_SECS", 300)?,
        };

        Ok(Self {
            database_url,
            host,
            port,
            database_max_connections,
            services: ServiceSettings { waitlist_offer_hours },
            jobs,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T, expected: &'static str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        }),
    }
}

fn positive(value: u32, name: &'static str) -> Result<u32, ConfigError> {
    if value == 0 {
        Err(ConfigError::NotPositive { name })
    } else {
        Ok(value)
    }
}

fn seconds<F>(lookup: &F, name: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse_or(lookup, name, default, "number of seconds")?;
    if secs == 0 {
        return Err(ConfigError::NotPositive { name });
    }
    Ok(Duration::from_secs(secs))
}
