use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub listen_addr: String,
    pub cors_origins: Vec<String>,
    /// IANA zone used when neither the date entry nor the actor names one.
    pub default_timezone: String,
    pub notify_webhook_url: Option<String>,
    pub meeting_link_webhook_url: Option<String>,
    pub db_max_connections: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters for security");
        }
        if jwt_secret.contains("change_me") {
            anyhow::bail!("JWT_SECRET contains placeholder value; set a real secret before running");
        }

        let default_timezone = std::env::var("DEFAULT_TIMEZONE").unwrap_or_else(|_| "UTC".into());
        default_timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| anyhow::anyhow!("DEFAULT_TIMEZONE '{}' is not an IANA zone", default_timezone))?;

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret,
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            default_timezone,
            notify_webhook_url: optional("NOTIFY_WEBHOOK_URL"),
            meeting_link_webhook_url: optional("MEETING_LINK_WEBHOOK_URL"),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".into())
                .parse()
                .context("DB_MAX_CONNECTIONS must be a number")?,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
