use super::require_guild;
use crate::{
    data::{AppState, PoiseContext, State},
    utils::ReplyThenDelete,
};
use bot_db::{
    settings::{SettingsDb, keys},
    streaks::{StreakDb, StreakUpdate, local_day},
};
use chrono::Utc;
use color_eyre::eyre::Result;
use itertools::Itertools;
use poise::serenity_prelude::{self as serenity, GuildId, Mentionable, User};
use std::{cmp::Reverse, time::Duration};

/// Today's day number at the guild's configured UTC offset.
fn today_for(data: &AppState, guild_id: GuildId) -> Result<i64> {
    let offset = SettingsDb::new(&data.db)?.get_or(guild_id, keys::TIMEZONE_OFFSET, 0.0)?;

    Ok(local_day(Utc::now(), offset))
}

pub async fn handle_message(
    ctx: &serenity::Context,
    data: &State,
    message: &serenity::Message,
) -> Result<()> {
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };

    let today = today_for(data, guild_id)?;
    let update = StreakDb::new(&data.db)?.advance(guild_id, message.author.id, today)?;

    match update {
        StreakUpdate::Extended { days } => {
            tracing::debug!("{} is on a {days} day streak", message.author.tag());

            message
                .reply_then_delete(ctx, format!("🔥 {days} day streak!"), Duration::from_secs(3))
                .await?;
        }
        StreakUpdate::Expired { lost } if lost > 0 => {
            message
                .reply_then_delete(
                    ctx,
                    format!("Your {lost} day streak has ended. Starting over!"),
                    Duration::from_secs(3),
                )
                .await?;
        }
        _ => {}
    }

    Ok(())
}

/// Get your current chat streak
#[poise::command(slash_command, guild_only, ephemeral = true)]
pub async fn streak(ctx: PoiseContext<'_>) -> Result<()> {
    let guild_id = require_guild(&ctx)?;

    let days = StreakDb::new(&ctx.data().db)?
        .current(guild_id, ctx.author().id)?
        .map_or(0, |record| record.days());

    ctx.say(format!("Your current streak: {days} days")).await?;

    Ok(())
}

/// Manage the chat streaks
#[poise::command(
    slash_command,
    guild_only,
    subcommands("reset", "show", "leaderboard")
)]
pub async fn streaks(_ctx: PoiseContext<'_>) -> Result<()> {
    Ok(())
}

/// Reset a member's streak
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_GUILD")]
pub async fn reset(ctx: PoiseContext<'_>, user: User) -> Result<()> {
    let guild_id = require_guild(&ctx)?;
    let today = today_for(ctx.data(), guild_id)?;

    StreakDb::new(&ctx.data().db)?.reset(guild_id, user.id, today)?;
    tracing::info!("{} reset the streak of {}", ctx.author().tag(), user.tag());

    ctx.say(format!("Reset the streak of {}", user.mention()))
        .await?;

    Ok(())
}

/// Get a member's streak
#[poise::command(
    slash_command,
    rename = "streak",
    ephemeral = true,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn show(ctx: PoiseContext<'_>, user: User) -> Result<()> {
    let guild_id = require_guild(&ctx)?;

    let days = StreakDb::new(&ctx.data().db)?
        .current(guild_id, user.id)?
        .map_or(0, |record| record.days());

    ctx.say(format!("{} is on a {days} day streak", user.mention()))
        .await?;

    Ok(())
}

/// See the server's longest running streaks
#[poise::command(slash_command, ephemeral = true)]
pub async fn leaderboard(ctx: PoiseContext<'_>) -> Result<()> {
    let guild_id = require_guild(&ctx)?;

    let entries = StreakDb::new(&ctx.data().db)?
        .for_guild(guild_id)
        .sorted_by_key(|(_, record)| Reverse(record.days()))
        .take(15)
        .collect_vec();

    if entries.is_empty() {
        ctx.say("Nobody has a streak yet. Go say something!").await?;
        return Ok(());
    }

    let mut message_text = String::from("### Streak leaderboard:\n");
    for (position, (user_id, record)) in entries.iter().enumerate() {
        message_text.push_str(&format!(
            "{}. {}: {} days\n",
            position + 1,
            user_id.mention(),
            record.days()
        ));
    }

    ctx.say(message_text).await?;

    Ok(())
}
