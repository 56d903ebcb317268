use super::require_guild;
use crate::data::PoiseContext;
use bot_db::warnings::WarningsDb;
use chrono::Utc;
use color_eyre::eyre::Result;
use itertools::Itertools;
use poise::serenity_prelude::{Mentionable, User, UserId};

/// Member warnings
#[poise::command(
    slash_command,
    guild_only,
    subcommands("add", "remove", "list"),
    required_permissions = "MODERATE_MEMBERS"
)]
pub async fn warnings(_ctx: PoiseContext<'_>) -> Result<()> {
    Ok(())
}

/// Warn a member
#[poise::command(slash_command, ephemeral = true)]
pub async fn add(ctx: PoiseContext<'_>, user: User, reason: String) -> Result<()> {
    let guild_id = require_guild(&ctx)?;
    let warnings = WarningsDb::new(&ctx.data().db)?;

    let warning = warnings.add(
        guild_id,
        user.id,
        ctx.author().id,
        reason,
        Utc::now().timestamp(),
    )?;
    let total = warnings.list(guild_id, user.id)?.len();

    tracing::info!(
        "{} warned {} (#{}) for: {}",
        ctx.author().tag(),
        user.tag(),
        warning.id,
        warning.reason
    );

    ctx.say(format!(
        "Warned {} (warning `{}`, {total} on record): {}",
        user.mention(),
        warning.id,
        warning.reason
    ))
    .await?;

    Ok(())
}

/// Remove one of a member's warnings
#[poise::command(slash_command, ephemeral = true)]
pub async fn remove(
    ctx: PoiseContext<'_>,
    user: User,
    #[description = "The id shown by /warnings list"] id: u64,
) -> Result<()> {
    let guild_id = require_guild(&ctx)?;

    if WarningsDb::new(&ctx.data().db)?.remove(guild_id, user.id, id)? {
        ctx.say(format!("Removed warning `{id}` from {}", user.mention()))
            .await?;
    } else {
        ctx.say(format!("{} has no warning `{id}`", user.mention()))
            .await?;
    }

    Ok(())
}

/// See a member's warnings
#[poise::command(slash_command, ephemeral = true)]
pub async fn list(ctx: PoiseContext<'_>, user: User) -> Result<()> {
    let guild_id = require_guild(&ctx)?;
    let warnings = WarningsDb::new(&ctx.data().db)?.list(guild_id, user.id)?;

    if warnings.is_empty() {
        ctx.say(format!("{} has no warnings", user.mention())).await?;
        return Ok(());
    }

    let lines = warnings
        .iter()
        .map(|warning| {
            format!(
                "`{}` <t:{}:R> by {}: {}",
                warning.id,
                warning.issued_at,
                UserId::new(warning.moderator).mention(),
                warning.reason
            )
        })
        .join("\n");

    ctx.say(format!("### Warnings for {}:\n{lines}", user.mention()))
        .await?;

    Ok(())
}
