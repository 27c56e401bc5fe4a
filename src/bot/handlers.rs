use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::time::Duration;
use tracing::{info, warn};

use crate::{
    audio::session::{PlaybackState, SessionSnapshot},
    bot::EggmanBot,
    error::MusicError,
    sources::{self, Track},
};

/// Máximo de entradas que `/queue` lista antes de resumir
const QUEUE_PAGE: usize = 15;

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &EggmanBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    let reply = match command.data.name.as_str() {
        "play" => return handle_play(ctx, &command, bot, guild_id).await,
        "queue" => Ok(format_queue(bot.registry.snapshot(guild_id).as_ref())),
        "skip" => bot
            .registry
            .skip(guild_id)
            .map(|track| format!("⏭️ Saltada: **{}**", track.title())),
        "pause" => bot
            .registry
            .pause(guild_id)
            .map(|_| "⏸️ Reproducción pausada".to_string()),
        "resume" => bot
            .registry
            .resume(guild_id)
            .map(|_| "▶️ Reproducción reanudada".to_string()),
        "stop" => {
            bot.registry.stop(guild_id);
            Ok("⏹️ Reproducción detenida y cola limpiada".to_string())
        }
        "leave" => bot
            .registry
            .leave(guild_id)
            .await
            .map(|_| "👋 Desconectado del canal de voz".to_string()),
        _ => {
            respond(ctx, &command, "❌ Comando no reconocido", true).await?;
            return Ok(());
        }
    };

    match reply {
        Ok(content) => respond(ctx, &command, &content, false).await,
        Err(e) => respond(ctx, &command, &format_error(&e), true).await,
    }
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &EggmanBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    // Verificar que el usuario esté en un canal de voz
    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond(ctx, command, "❌ Debes estar en un canal de voz", true).await;
    };

    // Defer la respuesta ya que la búsqueda puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let content = match play_flow(bot, guild_id, channel_id, query, command.user.id).await {
        Ok(content) => content,
        Err(e) => {
            warn!("⚠️ [{}] /play '{}' falló: {}", guild_id, query, e);
            format_error(&e)
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;

    Ok(())
}

/// Unirse, resolver fuera de cualquier lock y encolar con el ticket de la sesión
async fn play_flow(
    bot: &EggmanBot,
    guild_id: GuildId,
    channel_id: ChannelId,
    query: &str,
    user_id: UserId,
) -> Result<String, MusicError> {
    let ticket = bot.registry.get_or_create(guild_id, channel_id).await?;
    let track = sources::resolve_request(bot.resolver.as_ref(), query, user_id).await?;

    Ok(match bot.registry.enqueue_for(&ticket, track.clone())? {
        Some(position) => format_enqueued(position, &track),
        None => "⚠️ El bot salió del canal antes de terminar la búsqueda".to_string(),
    })
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id);
    channel_id
}

fn format_error(error: &MusicError) -> String {
    match error {
        MusicError::InvalidState {
            state: PlaybackState::Idle,
            ..
        } => "❌ No hay nada reproduciéndose".to_string(),
        other => format!("❌ {other}"),
    }
}

fn format_enqueued(position: usize, track: &Track) -> String {
    let duration = track
        .duration()
        .map(|d| format!(" `{}`", format_duration(d)))
        .unwrap_or_default();
    let requester = track
        .requested_by()
        .map(|user| format!(" · pedida por <@{}>", user))
        .unwrap_or_default();

    if position == 0 {
        format!("🎵 Reproduciendo ahora: **{}**{}{}", track.title(), duration, requester)
    } else {
        format!("➕ En cola #{}: **{}**{}{}", position, track.title(), duration, requester)
    }
}

fn format_queue(snapshot: Option<&SessionSnapshot>) -> String {
    let Some(snapshot) = snapshot.filter(|s| s.current.is_some()) else {
        return "📭 La cola está vacía".to_string();
    };

    let mut lines = Vec::new();
    if let Some(current) = &snapshot.current {
        let marker = match snapshot.state {
            PlaybackState::Paused => "⏸️",
            _ => "🎵",
        };
        lines.push(format!("{} **{}**", marker, current.title()));
    }

    for (i, track) in snapshot.upcoming.iter().take(QUEUE_PAGE).enumerate() {
        lines.push(format!("`{}.` {}", i + 1, track.title()));
    }

    let hidden = snapshot.upcoming.len().saturating_sub(QUEUE_PAGE);
    if hidden > 0 {
        lines.push(format!("… y {} más", hidden));
    }

    if !snapshot.upcoming_duration.is_zero() {
        lines.push(format!(
            "⏱️ Duración en cola: {}",
            format_duration(snapshot.upcoming_duration)
        ));
    }

    lines.join("\n")
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
