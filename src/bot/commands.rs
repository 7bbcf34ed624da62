use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        info_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        stop_command(),
    ]
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Encola un video de Youtube y arranca la reproducción")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "url",
                "URL del video de Youtube",
            )
            .required(true),
        )
}

fn info_command() -> CreateCommand {
    CreateCommand::new("info").description("Muestra la canción actual y la cola")
}

// Comandos de control

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip")
        .description("Salta la canción actual y las que siguen")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "count",
                "Número de canciones a saltar",
            )
            .min_int_value(1)
            .max_int_value(100),
        )
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción y limpia la cola")
}
