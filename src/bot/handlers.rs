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
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::{
    bot::GrooveBot,
    error::{ConnectError, SessionError, SourceError},
    sources::Track,
};

// Mensajes fijos hacia el usuario.
pub const AUTHOR_NOT_IN_VOICE_CHANNEL_MESSAGE: &str =
    "You need to be in a voice channel to use this command. Try joining a voice channel and trying again.";
pub const NO_SESSION_FOUND_MESSAGE: &str =
    "You need to have music queued to use this command. Try playing something with `/play <YOUTUBE VIDEO URL>`.";
pub const INVALID_YOUTUBE_URL_FOR_PLAY_MESSAGE: &str =
    "Invalid URL provided. Please provide a valid Youtube video URL.";
pub const INVALID_NUMBER_OF_SONGS_TO_SKIP_MESSAGE: &str =
    "Invalid number of songs to skip. Try skipping songs with `/skip <NUMBER OF SONGS>`.";
pub const GENERAL_ERROR_FOR_PLAY_MESSAGE: &str =
    "Unable to queue song due to an unknown error. Please contact the bot owner.";
pub const VOICE_CONNECT_FAILED_MESSAGE: &str =
    "Unable to join your voice channel. Please try again later.";
pub const NOT_PLAYING_MESSAGE: &str = "```\nNot playing\n```";

/// Despacha un comando slash al handler que corresponde.
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &GrooveBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot, guild_id).await?,
        "info" => handle_info(ctx, command, bot, guild_id).await?,
        "pause" => handle_pause(ctx, command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, command, bot, guild_id).await?,
        _ => respond(ctx, &command, "❌ Comando no reconocido").await?,
    }

    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    bot: &GrooveBot,
    guild_id: GuildId,
) -> Result<()> {
    let locator = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "url")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("url no proporcionada"))?
        .to_owned();

    // Defer: la resolución de metadata es una llamada de red.
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let Some(voice_channel) = author_voice_channel(ctx, guild_id, command.user.id) else {
        return edit_reply(ctx, &command, AUTHOR_NOT_IN_VOICE_CHANNEL_MESSAGE).await;
    };

    let track = match timeout(bot.config.resolve_timeout(), bot.resolver.resolve(&locator)).await {
        Ok(Ok(track)) => track,
        Ok(Err(SourceError::InvalidLocator(reason))) => {
            info!("🔗 URL rechazada ({reason}): {locator}");
            return edit_reply(ctx, &command, INVALID_YOUTUBE_URL_FOR_PLAY_MESSAGE).await;
        }
        Ok(Err(SourceError::ResolutionFailed(detail))) => {
            error!("❌ No se pudo resolver {locator}: {detail}");
            return edit_reply(ctx, &command, GENERAL_ERROR_FOR_PLAY_MESSAGE).await;
        }
        Err(_) => {
            warn!("⏰ Resolución de {locator} superó el tiempo límite");
            return edit_reply(ctx, &command, GENERAL_ERROR_FOR_PLAY_MESSAGE).await;
        }
    };

    match enqueue_track(ctx, bot, guild_id, voice_channel, &track).await {
        Ok(true) => {
            edit_reply(ctx, &command, format!("Successfully queued {}!", track.title)).await
        }
        Ok(false) => edit_reply(ctx, &command, GENERAL_ERROR_FOR_PLAY_MESSAGE).await,
        Err(e) => {
            error!("❌ No se pudo conectar al canal de voz {voice_channel}: {e}");
            edit_reply(ctx, &command, VOICE_CONNECT_FAILED_MESSAGE).await
        }
    }
}

/// Encola el track en la sesión del canal, creándola si no existe. Si la
/// sesión se desmonta en el medio, se reintenta con una sesión nueva en vez
/// de revivir la que está muriendo.
async fn enqueue_track(
    ctx: &Context,
    bot: &GrooveBot,
    guild_id: GuildId,
    voice_channel: ChannelId,
    track: &Track,
) -> Result<bool, ConnectError> {
    for _ in 0..3 {
        let session = bot
            .registry
            .get_or_create(voice_channel, || {
                bot.connect_port(ctx, guild_id, voice_channel)
            })
            .await?;

        if session.enqueue(track.clone()).is_ok() {
            return Ok(true);
        }

        tokio::task::yield_now().await;
    }

    Ok(false)
}

async fn handle_info(
    ctx: &Context,
    command: CommandInteraction,
    bot: &GrooveBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(voice_channel) = author_voice_channel(ctx, guild_id, command.user.id) else {
        return respond(ctx, &command, AUTHOR_NOT_IN_VOICE_CHANNEL_MESSAGE).await;
    };
    let Some(session) = bot.registry.get(voice_channel) else {
        return respond(ctx, &command, NO_SESSION_FOUND_MESSAGE).await;
    };

    let snapshot = session.snapshot(bot.config.queue_preview);
    match snapshot.current {
        Some(current) => {
            respond(ctx, &command, format_queue_reply(&current, &snapshot.upcoming)).await
        }
        None => respond(ctx, &command, NOT_PLAYING_MESSAGE).await,
    }
}

async fn handle_pause(
    ctx: &Context,
    command: CommandInteraction,
    bot: &GrooveBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(voice_channel) = author_voice_channel(ctx, guild_id, command.user.id) else {
        return respond(ctx, &command, AUTHOR_NOT_IN_VOICE_CHANNEL_MESSAGE).await;
    };
    let Some(session) = bot.registry.get(voice_channel) else {
        return respond(ctx, &command, NO_SESSION_FOUND_MESSAGE).await;
    };

    session.pause().await;
    respond(ctx, &command, "⏸️ Paused.").await
}

async fn handle_resume(
    ctx: &Context,
    command: CommandInteraction,
    bot: &GrooveBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(voice_channel) = author_voice_channel(ctx, guild_id, command.user.id) else {
        return respond(ctx, &command, AUTHOR_NOT_IN_VOICE_CHANNEL_MESSAGE).await;
    };
    let Some(session) = bot.registry.get(voice_channel) else {
        return respond(ctx, &command, NO_SESSION_FOUND_MESSAGE).await;
    };

    session.resume().await;
    respond(ctx, &command, "▶️ Resumed.").await
}

async fn handle_skip(
    ctx: &Context,
    command: CommandInteraction,
    bot: &GrooveBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(voice_channel) = author_voice_channel(ctx, guild_id, command.user.id) else {
        return respond(ctx, &command, AUTHOR_NOT_IN_VOICE_CHANNEL_MESSAGE).await;
    };

    let count = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "count")
        .and_then(|opt| opt.value.as_i64())
        .unwrap_or(1);
    if count < 1 {
        return respond(ctx, &command, INVALID_NUMBER_OF_SONGS_TO_SKIP_MESSAGE).await;
    }

    let Some(session) = bot.registry.get(voice_channel) else {
        return respond(ctx, &command, NO_SESSION_FOUND_MESSAGE).await;
    };

    match session.skip(count as usize).await {
        Ok(()) => respond(ctx, &command, "⏭️ Skipped.").await,
        Err(SessionError::InvalidSkipCount) => {
            respond(ctx, &command, INVALID_NUMBER_OF_SONGS_TO_SKIP_MESSAGE).await
        }
        Err(SessionError::Closed) => respond(ctx, &command, NO_SESSION_FOUND_MESSAGE).await,
    }
}

async fn handle_stop(
    ctx: &Context,
    command: CommandInteraction,
    bot: &GrooveBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(voice_channel) = author_voice_channel(ctx, guild_id, command.user.id) else {
        return respond(ctx, &command, AUTHOR_NOT_IN_VOICE_CHANNEL_MESSAGE).await;
    };
    let Some(session) = bot.registry.get(voice_channel) else {
        return respond(ctx, &command, NO_SESSION_FOUND_MESSAGE).await;
    };

    session.stop().await;
    respond(ctx, &command, "⏹️ Stopped and cleared the queue.").await
}

// Funciones auxiliares

/// Canal de voz en el que está el autor del comando, según el caché.
fn author_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = ctx.cache.guild(guild_id)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn format_queue_reply(current: &Track, upcoming: &[Track]) -> String {
    let mut reply = format!(
        "```\nNow playing: {} [{}s]\n",
        current.title, current.duration_secs
    );

    if !upcoming.is_empty() {
        reply.push_str("\nUp next:\n");
        for (position, track) in upcoming.iter().enumerate() {
            reply.push_str(&format!("{}: {}\n", position + 1, track.title));
        }
    }

    reply.push_str("```");
    reply
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;
    Ok(())
}

async fn edit_reply(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn track(title: &str, duration_secs: u64) -> Track {
        Track {
            title: title.to_owned(),
            duration_secs,
            video_url: format!("https://www.youtube.com/watch?v={title}"),
        }
    }

    #[test]
    fn test_format_queue_reply_with_upcoming() {
        let reply = format_queue_reply(&track("X", 10), &[track("Y", 20), track("Z", 30)]);

        assert_eq!(
            reply,
            "```\nNow playing: X [10s]\n\nUp next:\n1: Y\n2: Z\n```"
        );
    }

    #[test]
    fn test_format_queue_reply_without_upcoming() {
        let reply = format_queue_reply(&track("X", 10), &[]);

        assert_eq!(reply, "```\nNow playing: X [10s]\n```");
    }
}
