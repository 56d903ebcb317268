use super::require_guild;
use crate::{
    data::{AppState, PoiseContext, State},
    utils::ReplyThenDelete,
};
use bot_db::{
    leveling::{self, Multiplier, MultiplierDb, XpDb},
    settings::{SettingsDb, keys},
};
use chrono::Utc;
use color_eyre::eyre::Result;
use itertools::Itertools;
use poise::serenity_prelude::{self as serenity, GuildId, Mentionable, User, UserId};
use std::{cmp::Reverse, time::Duration};

pub const DEFAULT_XP_PER_LEVEL: i64 = 500;
pub const DEFAULT_XP_PER_MESSAGE: i64 = 3;

/// The currently effective XP multiplier for a guild: the base setting
/// times every seasonal multiplier whose window contains today.
fn current_multiplier(data: &AppState, guild_id: GuildId) -> Result<i64> {
    let settings = SettingsDb::new(&data.db)?;
    let offset = settings.get_or(guild_id, keys::TIMEZONE_OFFSET, 0.0)?;
    let base = settings.get_or(guild_id, keys::BASE_XP_MULTIPLIER, 1i64)?;
    let multipliers = MultiplierDb::new(&data.db)?.list(guild_id);

    Ok(leveling::effective_multiplier(
        base,
        &multipliers,
        leveling::local_month_day(Utc::now(), offset),
    ))
}

fn xp_per_level(data: &AppState, guild_id: GuildId) -> Result<i64> {
    SettingsDb::new(&data.db)?.get_or(guild_id, keys::XP_PER_LEVEL, DEFAULT_XP_PER_LEVEL)
}

/// Grant `base_xp` scaled by the active multiplier. Returns the level
/// before and after, so callers can announce level-ups.
pub fn grant_xp(
    data: &AppState,
    guild_id: GuildId,
    user_id: UserId,
    base_xp: i64,
) -> Result<(i64, i64)> {
    let multiplier = current_multiplier(data, guild_id)?;
    let per_level = xp_per_level(data, guild_id)?;

    let xp = XpDb::new(&data.db)?;
    let before = xp.get(guild_id, user_id)?;
    let after = xp.add(guild_id, user_id, base_xp.saturating_mul(multiplier))?;

    Ok((
        leveling::level_for_xp(before, per_level),
        leveling::level_for_xp(after, per_level),
    ))
}

pub async fn handle_message(
    ctx: &serenity::Context,
    data: &State,
    message: &serenity::Message,
) -> Result<()> {
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };

    let per_message =
        SettingsDb::new(&data.db)?.get_or(guild_id, keys::XP_PER_MESSAGE, DEFAULT_XP_PER_MESSAGE)?;
    if per_message <= 0 {
        return Ok(());
    }

    let (before, after) = grant_xp(data, guild_id, message.author.id, per_message)?;

    if after > before {
        message
            .reply_then_delete(
                ctx,
                format!("🎉 {} reached level {after}!", message.author.mention()),
                Duration::from_secs(5),
            )
            .await?;
    }

    Ok(())
}

/// See your (or someone else's) level
#[poise::command(slash_command, guild_only, ephemeral = true)]
pub async fn level(ctx: PoiseContext<'_>, user: Option<User>) -> Result<()> {
    let guild_id = require_guild(&ctx)?;
    let user = user.as_ref().unwrap_or_else(|| ctx.author());

    let xp = XpDb::new(&ctx.data().db)?.get(guild_id, user.id)?;
    let per_level = xp_per_level(ctx.data(), guild_id)?;
    let level = leveling::level_for_xp(xp, per_level);
    let next = leveling::xp_for_level(level + 1, per_level);

    ctx.say(format!(
        "{} is level {level} ({xp}/{next} XP)",
        user.mention()
    ))
    .await?;

    Ok(())
}

/// Leveling configuration and rankings
#[poise::command(
    slash_command,
    guild_only,
    subcommands(
        "leaderboard",
        "set_xp_per_level",
        "set_xp_per_message",
        "set_base_multiplier",
        "multiplier_add",
        "multiplier_remove",
        "multiplier_list",
    )
)]
pub async fn leveling(_ctx: PoiseContext<'_>) -> Result<()> {
    Ok(())
}

/// See who has the most XP
#[poise::command(slash_command, ephemeral = true)]
pub async fn leaderboard(ctx: PoiseContext<'_>) -> Result<()> {
    let guild_id = require_guild(&ctx)?;
    let per_level = xp_per_level(ctx.data(), guild_id)?;

    let entries = XpDb::new(&ctx.data().db)?
        .for_guild(guild_id)
        .sorted_by_key(|(_, xp)| Reverse(*xp))
        .take(15)
        .collect_vec();

    if entries.is_empty() {
        ctx.say("Nobody has any XP yet").await?;
        return Ok(());
    }

    let mut message_text = String::from("### XP leaderboard:\n");
    for (position, (user_id, xp)) in entries.iter().enumerate() {
        message_text.push_str(&format!(
            "{}. {}: level {} ({xp} XP)\n",
            position + 1,
            user_id.mention(),
            leveling::level_for_xp(*xp, per_level)
        ));
    }

    ctx.say(message_text).await?;

    Ok(())
}

/// Set how much XP one level costs
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_GUILD")]
pub async fn set_xp_per_level(
    ctx: PoiseContext<'_>,
    #[min = 1] #[description = "XP needed per level"] xp: i64,
) -> Result<()> {
    let guild_id = require_guild(&ctx)?;

    SettingsDb::new(&ctx.data().db)?.set(guild_id, keys::XP_PER_LEVEL, &xp)?;
    ctx.say(format!("One level now costs {xp} XP")).await?;

    Ok(())
}

/// Set how much XP a message earns (0 disables message XP)
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_GUILD")]
pub async fn set_xp_per_message(
    ctx: PoiseContext<'_>,
    #[min = 0] #[description = "XP per message"] xp: i64,
) -> Result<()> {
    let guild_id = require_guild(&ctx)?;

    SettingsDb::new(&ctx.data().db)?.set(guild_id, keys::XP_PER_MESSAGE, &xp)?;
    ctx.say(format!("Messages now earn {xp} XP")).await?;

    Ok(())
}

/// Set the always-on XP multiplier seasonal multipliers stack onto
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_GUILD")]
pub async fn set_base_multiplier(
    ctx: PoiseContext<'_>,
    #[min = 1] #[description = "The base multiplication factor"] factor: i64,
) -> Result<()> {
    let guild_id = require_guild(&ctx)?;

    SettingsDb::new(&ctx.data().db)?.set(guild_id, keys::BASE_XP_MULTIPLIER, &factor)?;
    ctx.say(format!("Base XP multiplier set to {factor}x")).await?;

    Ok(())
}

/// Add a seasonal XP multiplier, active between two month/day points
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_GUILD")]
pub async fn multiplier_add(
    ctx: PoiseContext<'_>,
    #[description = "A name to refer to it by"] name: String,
    #[min = 1] #[description = "The multiplication factor"] factor: i64,
    #[min = 1] #[max = 12] start_month: u32,
    #[min = 1] #[max = 31] start_day: u32,
    #[min = 1] #[max = 12] end_month: u32,
    #[min = 1] #[max = 31] end_day: u32,
) -> Result<()> {
    let guild_id = require_guild(&ctx)?;
    let multipliers = MultiplierDb::new(&ctx.data().db)?;

    if multipliers.get(guild_id, &name)?.is_some() {
        ctx.say(format!("A multiplier named `{name}` already exists"))
            .await?;
        return Ok(());
    }

    let multiplier = Multiplier {
        name: name.clone(),
        factor,
        start: (start_month, start_day),
        end: (end_month, end_day),
    };
    multipliers.insert(guild_id, &multiplier)?;

    ctx.say(format!(
        "Added `{name}`: {factor}x XP from {start_month:02}-{start_day:02} to {end_month:02}-{end_day:02}"
    ))
    .await?;

    Ok(())
}

/// Remove a seasonal XP multiplier
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_GUILD")]
pub async fn multiplier_remove(ctx: PoiseContext<'_>, name: String) -> Result<()> {
    let guild_id = require_guild(&ctx)?;

    if MultiplierDb::new(&ctx.data().db)?.remove(guild_id, &name)? {
        ctx.say(format!("Removed `{name}`")).await?;
    } else {
        ctx.say(format!("No multiplier named `{name}`")).await?;
    }

    Ok(())
}

/// List the seasonal XP multipliers
#[poise::command(slash_command, ephemeral = true)]
pub async fn multiplier_list(ctx: PoiseContext<'_>) -> Result<()> {
    let guild_id = require_guild(&ctx)?;
    let multipliers = MultiplierDb::new(&ctx.data().db)?.list(guild_id);

    if multipliers.is_empty() {
        ctx.say("No multipliers configured").await?;
        return Ok(());
    }

    let effective = current_multiplier(ctx.data(), guild_id)?;
    let lines = multipliers
        .iter()
        .map(|multiplier| {
            format!(
                "`{}`: {}x from {:02}-{:02} to {:02}-{:02}",
                multiplier.name,
                multiplier.factor,
                multiplier.start.0,
                multiplier.start.1,
                multiplier.end.0,
                multiplier.end.1
            )
        })
        .join("\n");

    ctx.say(format!("{lines}\n\nEffective multiplier right now: {effective}x"))
        .await?;

    Ok(())
}
