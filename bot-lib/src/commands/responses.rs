use super::require_guild;
use crate::data::{PoiseContext, State};
use ahash::AHashMap;
use bot_db::responses::{AutoResponse, ResponseDb};
use color_eyre::eyre::Result;
use itertools::Itertools;
use parking_lot::Mutex;
use poise::serenity_prelude::{self as serenity, ChannelId};
use std::{
    sync::LazyLock,
    time::{Duration, Instant},
};

/// Per-channel cooldown so a popular trigger can't flood a channel.
const REPLY_COOLDOWN: Duration = Duration::from_secs(15);

static LAST_REPLY_BY_CHANNEL: LazyLock<Mutex<AHashMap<ChannelId, Instant>>> =
    LazyLock::new(|| Mutex::new(AHashMap::new()));

pub async fn handle_message(
    ctx: &serenity::Context,
    data: &State,
    message: &serenity::Message,
) -> Result<()> {
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };

    let Some(reply) = ResponseDb::new(&data.db)?.find_reply(guild_id, &message.content) else {
        return Ok(());
    };

    {
        let mut last_replies = LAST_REPLY_BY_CHANNEL.lock();
        if last_replies
            .get(&message.channel_id)
            .is_some_and(|at| at.elapsed() < REPLY_COOLDOWN)
        {
            tracing::debug!("Auto response in {} suppressed by cooldown", message.channel_id);
            return Ok(());
        }
        last_replies.insert(message.channel_id, Instant::now());
    }

    message.reply(ctx, reply).await?;

    Ok(())
}

/// Automatic replies to trigger phrases
#[poise::command(
    slash_command,
    guild_only,
    subcommands("add", "remove", "edit", "list"),
    required_permissions = "MANAGE_MESSAGES"
)]
pub async fn autoresponse(_ctx: PoiseContext<'_>) -> Result<()> {
    Ok(())
}

/// Add an automatic reply
#[poise::command(slash_command, ephemeral = true)]
pub async fn add(
    ctx: PoiseContext<'_>,
    #[description = "Reply when a message contains this"] trigger: String,
    #[description = "What to reply with"] reply: String,
) -> Result<()> {
    let guild_id = require_guild(&ctx)?;

    if trigger.trim().len() < 3 {
        ctx.say("The trigger must be at least 3 characters").await?;
        return Ok(());
    }

    let id = ResponseDb::new(&ctx.data().db)?.add(guild_id, trigger.clone(), reply)?;

    ctx.say(format!("Added auto response `{id}` for `{trigger}`"))
        .await?;

    Ok(())
}

/// Remove an automatic reply
#[poise::command(slash_command, ephemeral = true)]
pub async fn remove(
    ctx: PoiseContext<'_>,
    #[description = "The id shown by /autoresponse list"] id: u64,
) -> Result<()> {
    let guild_id = require_guild(&ctx)?;

    if ResponseDb::new(&ctx.data().db)?.remove(guild_id, id)? {
        ctx.say(format!("Removed auto response `{id}`")).await?;
    } else {
        ctx.say(format!("No auto response `{id}` here")).await?;
    }

    Ok(())
}

/// Change an automatic reply's trigger or reply text
#[poise::command(slash_command, ephemeral = true)]
pub async fn edit(
    ctx: PoiseContext<'_>,
    #[description = "The id shown by /autoresponse list"] id: u64,
    trigger: Option<String>,
    reply: Option<String>,
) -> Result<()> {
    let guild_id = require_guild(&ctx)?;
    let responses = ResponseDb::new(&ctx.data().db)?;

    let Some(current) = responses.get(guild_id, id)? else {
        ctx.say(format!("No auto response `{id}` here")).await?;
        return Ok(());
    };

    let updated = AutoResponse {
        trigger: trigger.unwrap_or(current.trigger),
        reply: reply.unwrap_or(current.reply),
    };

    if updated.trigger.trim().len() < 3 {
        ctx.say("The trigger must be at least 3 characters").await?;
        return Ok(());
    }

    responses.update(guild_id, id, &updated)?;
    ctx.say(format!("Updated auto response `{id}`")).await?;

    Ok(())
}

/// List the automatic replies
#[poise::command(slash_command, ephemeral = true)]
pub async fn list(ctx: PoiseContext<'_>) -> Result<()> {
    let guild_id = require_guild(&ctx)?;
    let responses = ResponseDb::new(&ctx.data().db)?.list(guild_id);

    if responses.is_empty() {
        ctx.say("No auto responses configured").await?;
        return Ok(());
    }

    let message_text = responses
        .iter()
        .map(|(id, response)| {
            format!("`{id}`: `{}` -> {}", response.trigger, response.reply)
        })
        .join("\n");

    ctx.say(message_text).await?;

    Ok(())
}
