//! # Bot Module
//!
//! Capa Discord del bot: registra los comandos slash, atiende las
//! interacciones y abre conexiones de voz. Toda la lógica de colas y
//! transiciones vive en [`crate::audio`]; acá solo se traduce entre
//! interacciones y operaciones de sesión.

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{PlaybackPort, SessionRegistry, SongbirdPort},
    config::Config,
    error::ConnectError,
    sources::{SourceResolver, YtDlpResolver},
};

/// Handler principal del bot: configuración, registro de sesiones y el
/// cliente HTTP compartido para los streams de audio.
pub struct GrooveBot {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub resolver: Arc<dyn SourceResolver>,
    http: reqwest::Client,
}

impl GrooveBot {
    pub fn new(config: Config, http: reqwest::Client) -> Self {
        let config = Arc::new(config);
        let resolver: Arc<dyn SourceResolver> = Arc::new(YtDlpResolver::new());
        let registry = SessionRegistry::new(Arc::clone(&resolver), config.resolve_timeout());

        Self {
            config,
            registry,
            resolver,
            http,
        }
    }

    /// Abre la conexión de voz del canal y la envuelve en el puerto de
    /// reproducción que la sesión va a poseer en exclusiva.
    pub(crate) async fn connect_port(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn PlaybackPort>, ConnectError> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| ConnectError("songbird no inicializado".into()))?;

        match manager.join(guild_id, channel_id).await {
            Ok(call) => {
                info!("🔊 Conectado al canal de voz {channel_id} en guild {guild_id}");
                Ok(Arc::new(SongbirdPort::new(call, self.http.clone())) as Arc<dyn PlaybackPort>)
            }
            Err(e) => {
                // No dejar una Call a medio armar colgada en songbird.
                let _ = manager.remove(guild_id).await;
                Err(ConnectError(e.to_string()))
            }
        }
    }

    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos registrados para guild {guild_id}");
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for GrooveBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {e:?}");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {e:?}");
            }
        }
    }
}
