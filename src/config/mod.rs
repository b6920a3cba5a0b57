use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub track_server: ServerConfig,
    pub tracking: TrackingConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Public base URL of the tracking server, used when rewriting banner HTML.
    pub public_base_url: String,
    /// Where clicks land when the banner or its destination cannot be resolved.
    pub fallback_redirect_url: String,
    /// HTTP status for click redirects (301/302/303/307/308).
    pub redirect_status: u16,
    /// Upper bound on any single store call from the tracking handlers.
    pub store_timeout_ms: u64,
    /// Honour X-Forwarded-For / X-Real-IP from a trusted proxy layer.
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,
    pub ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./beacon.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(5);

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let track_host = std::env::var("TRACK_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let track_port = std::env::var("TRACK_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()?;

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", track_host, track_port));

        let fallback_redirect_url =
            std::env::var("FALLBACK_REDIRECT_URL").unwrap_or_else(|_| "/".to_string());

        let redirect_status = std::env::var("REDIRECT_STATUS")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(302);
        let redirect_status = match redirect_status {
            301 | 302 | 303 | 307 | 308 => redirect_status,
            other => {
                tracing::warn!(
                    "REDIRECT_STATUS {other} is not a redirect status, falling back to 302"
                );
                302
            }
        };

        let store_timeout_ms = std::env::var("STORE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(2000);

        let trust_proxy_headers = std::env::var("TRUST_PROXY_HEADERS")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        let cache_enabled = std::env::var("BANNER_CACHE_ENABLED")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(true);
        let cache_max_entries = std::env::var("BANNER_CACHE_MAX_ENTRIES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10_000);
        let cache_ttl_secs = std::env::var("BANNER_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            track_server: ServerConfig {
                host: track_host,
                port: track_port,
            },
            tracking: TrackingConfig {
                public_base_url,
                fallback_redirect_url,
                redirect_status,
                store_timeout_ms,
                trust_proxy_headers,
            },
            cache: CacheConfig {
                enabled: cache_enabled,
                max_entries: cache_max_entries,
                ttl_secs: cache_ttl_secs,
            },
        })
    }
}
