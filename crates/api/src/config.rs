use layoutgen_core::replica::ReplicaId;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret and the generation endpoint have
/// defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Bounds the time to
    /// the response head; streamed bodies are not cut off.
    pub request_timeout_secs: u64,
    /// This replica's identity, recorded on every task it starts.
    pub replica_id: ReplicaId,
    /// PostgreSQL URL. When unset the service keeps jobs in memory.
    pub database_url: Option<String>,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Upstream generation endpoint.
    pub generation: GenerationConfig,
    /// Payments provider; `None` means nobody holds the app benefit.
    pub entitlements: Option<EntitlementsConfig>,
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub api_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EntitlementsConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub benefit_id: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                          |
    /// |--------------------------|----------------------------------|
    /// | `HOST`                   | `0.0.0.0`                        |
    /// | `PORT`                   | `3000`                           |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`          |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                             |
    /// | `REPLICA_ID`             | `FLY_MACHINE_ID`, else `local`   |
    /// | `DATABASE_URL`           | unset (in-memory store)          |
    /// | `JWT_SECRET`             | **required**                     |
    /// | `GENERATION_API_URL`     | **required**                     |
    /// | `GENERATION_API_KEY`     | unset                            |
    /// | `ENTITLEMENTS_API_URL`   | unset (no benefits)              |
    /// | `ENTITLEMENTS_API_TOKEN` | unset                            |
    /// | `APP_BENEFIT_ID`         | empty                            |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let replica_id = non_empty_var("REPLICA_ID")
            .or_else(|| non_empty_var("FLY_MACHINE_ID"))
            .map(ReplicaId::new)
            .unwrap_or_else(|| ReplicaId::new("local"));

        let generation = GenerationConfig {
            api_url: non_empty_var("GENERATION_API_URL")
                .expect("GENERATION_API_URL must be set in the environment"),
            api_key: non_empty_var("GENERATION_API_KEY"),
        };

        let entitlements = non_empty_var("ENTITLEMENTS_API_URL").map(|api_url| EntitlementsConfig {
            api_url,
            api_token: non_empty_var("ENTITLEMENTS_API_TOKEN"),
            benefit_id: non_empty_var("APP_BENEFIT_ID").unwrap_or_default(),
        });

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            replica_id,
            database_url: non_empty_var("DATABASE_URL"),
            jwt: JwtConfig::from_env(),
            generation,
            entitlements,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
