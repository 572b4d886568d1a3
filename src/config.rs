use dotenvy::dotenv;
use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// When set, room fan-out goes through Redis pub/sub so multiple
    /// gateway instances converge; unset means single-instance in-process
    /// fan-out.
    pub redis_url: Option<String>,
    pub port: u16,
    pub jwt_public_key_pem: String,
    /// Default history page size when the client does not ask for one.
    pub history_page_size: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Config("DATABASE_URL missing".into()))?;

        let redis_url = env::var("REDIS_URL").ok().filter(|s| !s.trim().is_empty());

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8086);

        // Validation key only: this service never mints tokens.
        let jwt_public_key_pem = match env::var("JWT_PUBLIC_KEY_PEM") {
            Ok(pem) => pem,
            Err(_) => {
                let path = env::var("JWT_PUBLIC_KEY_FILE")
                    .map_err(|_| AppError::Config("JWT_PUBLIC_KEY_PEM missing".into()))?;
                std::fs::read_to_string(path)
                    .map_err(|e| AppError::Config(format!("read jwt pubkey file: {e}")))?
            }
        };

        let history_page_size = env::var("HISTORY_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50);

        Ok(Self {
            database_url,
            redis_url,
            port,
            jwt_public_key_pem,
            history_page_size,
        })
    }

    #[cfg(test)]
    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/chat_test".into(),
            redis_url: None,
            port: 8086,
            jwt_public_key_pem: String::new(),
            history_page_size: 50,
        }
    }
}
