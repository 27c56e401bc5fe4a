//! # Bot Module
//!
//! Discord front end for the Eggman bot.
//!
//! - [`commands`]: slash command definitions and registration
//! - [`handlers`]: one handler per command, translating replies and errors
//!   into plain-text interaction responses
//!
//! ## Architecture
//!
//! [`EggmanBot`] implements Serenity's [`EventHandler`] trait. It holds no
//! playback state of its own: every command goes through the shared
//! [`SessionRegistry`], and song requests are resolved with the configured
//! [`TrackResolver`] before they reach a session.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{audio::registry::SessionRegistry, config::Config, sources::TrackResolver};

/// Handler principal de eventos de Discord
pub struct EggmanBot {
    config: Arc<Config>,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) resolver: Arc<dyn TrackResolver>,
}

impl EggmanBot {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<SessionRegistry>,
        resolver: Arc<dyn TrackResolver>,
    ) -> Self {
        Self {
            config,
            registry,
            resolver,
        }
    }

    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        // Registrar comandos globales o por guild según configuración
        match self.config.guild_id {
            Some(guild_id) => {
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await
            }
            None => {
                info!("🌍 Registrando comandos globales");
                commands::register_global_commands(ctx).await
            }
        }
    }
}

#[async_trait]
impl EventHandler for EggmanBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    /// Los errores se registran pero nunca tiran el proceso
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Si el bot deja de estar en voz (kick, desconexión manual), se cierra la sesión
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id.or_else(|| old.and_then(|o| o.guild_id)) else {
            return;
        };

        if self.registry.get(guild_id).is_some() {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            self.registry.handle_disconnect(guild_id).await;
        }
    }
}
