use harvest_core::AppError;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Pool settings for the frontier database.
///
/// The pool defaults small: the crawler is network-bound and holds a
/// connection only for the short claim/mark transactions.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Read `DATABASE_URL` (required) and `DATABASE_MAX_CONNECTIONS`
    /// from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse settings through a lookup function, so tests can inject
    /// values without touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let url = lookup("DATABASE_URL").ok_or_else(|| {
            AppError::ConfigError("DATABASE_URL not set. Required for database operations.".into())
        })?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| {
                    AppError::ConfigError(format!(
                        "Invalid DATABASE_MAX_CONNECTIONS '{raw}': must be a positive integer"
                    ))
                })?,
        };

        Ok(Self {
            url,
            max_connections,
        })
    }
}
