use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Scheduler
    /// Cota en segundos para las llamadas al resolvedor de fuentes; un
    /// link malo no puede trabar la cola de un canal más que esto.
    pub resolve_timeout_secs: u64,
    /// Cantidad de títulos siguientes que muestra /info.
    pub queue_preview: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Scheduler
            resolve_timeout_secs: std::env::var("RESOLVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            queue_preview: std::env::var("QUEUE_PREVIEW")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("El timeout de resolución debe ser mayor a 0");
        }

        if self.queue_preview == 0 {
            anyhow::bail!("La vista previa de la cola debe mostrar al menos 1 título");
        }

        Ok(())
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    /// Resumen apto para logs (sin el token).
    pub fn summary(&self) -> String {
        format!(
            "Config: app {} (guild: {}), resolve timeout {}s, preview de {} títulos",
            self.application_id,
            self.guild_id
                .map_or("global".to_string(), |id| id.to_string()),
            self.resolve_timeout_secs,
            self.queue_preview,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,
            resolve_timeout_secs: 30,
            queue_preview: 5,
        }
    }
}
