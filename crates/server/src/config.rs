//! Server configuration from environment variables

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string (required)
    pub database_url: String,
    /// Redis connection string for the message queue (required)
    pub queue_url: String,
    /// HTTP bind address for the health surface
    pub bind_address: String,
    /// Prefixes the queue keys: `<name>:queue`, `<name>:processing`,
    /// `<name>:dead_letter`
    pub service_name: String,
    /// Upper bound on concurrently in-flight reconciliations
    pub max_in_flight: usize,
    /// Deliveries per message before a retried message is dead-lettered
    pub max_delivery_attempts: u32,
    /// Mount the raw-write debug route. Never enable in production.
    pub enable_debug_endpoints: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let queue_url = std::env::var("QUEUE_URL").context("QUEUE_URL must be set")?;

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let service_name =
            std::env::var("SERVICE_NAME").unwrap_or_else(|_| "collector".to_string());

        let max_in_flight = std::env::var("MAX_IN_FLIGHT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(16);

        let max_delivery_attempts = std::env::var("MAX_DELIVERY_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let enable_debug_endpoints = std::env::var("ENABLE_DEBUG_ENDPOINTS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            database_url,
            queue_url,
            bind_address,
            service_name,
            max_in_flight,
            max_delivery_attempts,
            enable_debug_endpoints,
        })
    }

    pub fn queue_key(&self) -> String {
        format!("{}:queue", self.service_name)
    }

    pub fn processing_key(&self) -> String {
        format!("{}:processing", self.service_name)
    }

    pub fn dead_letter_key(&self) -> String {
        format!("{}:dead_letter", self.service_name)
    }

    /// Hash of per-message delivery attempt counters
    pub fn retries_key(&self) -> String {
        format!("{}:retries", self.service_name)
    }
}
