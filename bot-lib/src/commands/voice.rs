use super::require_guild;
use crate::data::{AppState, PoiseContext, State};
use bot_db::{
    settings::{SettingsDb, keys},
    voice::{LeaveOutcome, VcDb, VcRoom},
};
use color_eyre::eyre::{OptionExt, Result, WrapErr};
use poise::serenity_prelude::{
    self as serenity, ChannelId, ChannelType, CreateChannel, EditChannel, EditMember, GuildId,
    Mentionable, UserId, VoiceState,
};

pub const DEFAULT_NAME_TEMPLATE: &str = "{name}'s channel";

/// Joins, leaves and moves all reduce to leave-old then join-new. Mute
/// and deafen updates carry the same channel on both sides and are
/// ignored.
pub async fn handle_voice_state_update(
    ctx: &serenity::Context,
    data: &State,
    old: Option<&VoiceState>,
    new: &VoiceState,
) -> Result<()> {
    let Some(guild_id) = new.guild_id.or_else(|| old.and_then(|state| state.guild_id)) else {
        return Ok(());
    };

    let previous = old.and_then(|state| state.channel_id);
    let current = new.channel_id;

    if previous == current {
        return Ok(());
    }

    if let Some(channel_id) = previous {
        handle_leave(ctx, data, guild_id, channel_id, new.user_id).await?;
    }

    if let Some(channel_id) = current {
        handle_join(ctx, data, guild_id, channel_id, new.user_id).await?;
    }

    Ok(())
}

async fn handle_join(
    ctx: &serenity::Context,
    data: &State,
    guild_id: GuildId,
    channel_id: ChannelId,
    user_id: UserId,
) -> Result<()> {
    let vc = VcDb::new(&data.db)?;

    if vc.is_creator(guild_id, channel_id)? {
        let room = create_room(ctx, data, guild_id, channel_id, user_id).await?;

        guild_id
            .edit_member(ctx, user_id, EditMember::new().voice_channel(room))
            .await
            .wrap_err("Failed to move member into their new room")?;

        return Ok(());
    }

    if let Some(mut room) = vc.room(channel_id)? {
        room.join(user_id);
        vc.save_room(channel_id, &room)?;
    }

    Ok(())
}

async fn create_room(
    ctx: &serenity::Context,
    data: &AppState,
    guild_id: GuildId,
    creator_id: ChannelId,
    user_id: UserId,
) -> Result<ChannelId> {
    let template =
        SettingsDb::new(&data.db)?.get_or(guild_id, keys::VC_NAME_TEMPLATE, DEFAULT_NAME_TEMPLATE.to_owned())?;

    let member = guild_id.member(ctx, user_id).await?;
    let guild_name = guild_id.name(ctx).unwrap_or_default();
    let name = template
        .replace("{name}", member.display_name())
        .replace("{username}", &member.user.name)
        .replace("{guild}", &guild_name);

    let channels = guild_id.channels(ctx).await?;
    let creator = channels
        .get(&creator_id)
        .ok_or_eyre("Creator channel vanished")?;

    let mut builder = CreateChannel::new(name)
        .kind(ChannelType::Voice)
        .audit_log_reason("Temporary voice channel");
    if let Some(category) = creator.parent_id {
        builder = builder.category(category);
    }
    if let Some(bitrate) = creator.bitrate {
        builder = builder.bitrate(bitrate);
    }
    if let Some(user_limit) = creator.user_limit {
        builder = builder.user_limit(user_limit);
    }

    let channel = guild_id
        .create_channel(ctx, builder)
        .await
        .wrap_err("Failed to create temporary voice channel")?;

    VcDb::new(&data.db)?.save_room(channel.id, &VcRoom::create(guild_id, user_id))?;

    tracing::info!(
        "Created temporary voice channel {} for {}",
        channel.id,
        member.user.tag()
    );

    Ok(channel.id)
}

async fn handle_leave(
    ctx: &serenity::Context,
    data: &State,
    guild_id: GuildId,
    channel_id: ChannelId,
    user_id: UserId,
) -> Result<()> {
    let vc = VcDb::new(&data.db)?;

    let Some(mut room) = vc.room(channel_id)? else {
        return Ok(());
    };

    match room.leave(user_id) {
        LeaveOutcome::Delete => {
            vc.remove_room(channel_id)?;
            channel_id
                .delete(ctx)
                .await
                .wrap_err("Failed to delete empty temporary channel")?;

            tracing::info!("Deleted empty temporary voice channel {channel_id} in {guild_id}");
        }
        LeaveOutcome::Promote(new_owner) => {
            vc.save_room(channel_id, &room)?;

            tracing::info!("Promoted {new_owner} to owner of {channel_id} in {guild_id}");
        }
        LeaveOutcome::Stay => vc.save_room(channel_id, &room)?,
    }

    Ok(())
}

/// Temporary voice channels
#[poise::command(
    slash_command,
    guild_only,
    subcommands("add_creator", "remove_creator", "set_name_template", "name", "limit")
)]
pub async fn tempvc(_ctx: PoiseContext<'_>) -> Result<()> {
    Ok(())
}

/// Make joining a voice channel spawn temporary channels
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_GUILD")]
pub async fn add_creator(
    ctx: PoiseContext<'_>,
    #[channel_types("Voice")] channel: serenity::Channel,
) -> Result<()> {
    let guild_id = require_guild(&ctx)?;

    VcDb::new(&ctx.data().db)?.add_creator(guild_id, channel.id())?;

    ctx.say(format!(
        "Joining {} now creates a temporary voice channel",
        channel.id().mention()
    ))
    .await?;

    Ok(())
}

/// Stop a voice channel from spawning temporary channels
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_GUILD")]
pub async fn remove_creator(
    ctx: PoiseContext<'_>,
    #[channel_types("Voice")] channel: serenity::Channel,
) -> Result<()> {
    let guild_id = require_guild(&ctx)?;

    if VcDb::new(&ctx.data().db)?.remove_creator(guild_id, channel.id())? {
        ctx.say(format!("{} is no longer a creator channel", channel.id().mention()))
            .await?;
    } else {
        ctx.say(format!("{} wasn't a creator channel", channel.id().mention()))
            .await?;
    }

    Ok(())
}

/// Template for room names; {name}, {username} and {guild} are replaced
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_GUILD")]
pub async fn set_name_template(ctx: PoiseContext<'_>, template: String) -> Result<()> {
    let guild_id = require_guild(&ctx)?;

    if template.trim().is_empty() || template.chars().count() > 90 {
        ctx.say("The template must be 1 to 90 characters").await?;
        return Ok(());
    }

    SettingsDb::new(&ctx.data().db)?.set(guild_id, keys::VC_NAME_TEMPLATE, &template)?;
    ctx.say(format!("Rooms will be named `{template}`")).await?;

    Ok(())
}

/// Looks up the room for the channel the command was sent in, if the
/// author owns it. Replies with the reason when they don't.
async fn owned_room(ctx: &PoiseContext<'_>) -> Result<Option<VcRoom>> {
    let Some(room) = VcDb::new(&ctx.data().db)?.room(ctx.channel_id())? else {
        ctx.say("This isn't a temporary voice channel. Use this command in one.")
            .await?;
        return Ok(None);
    };

    if !room.is_owner(ctx.author().id) {
        ctx.say("Only the channel owner can do that").await?;
        return Ok(None);
    }

    Ok(Some(room))
}

/// Rename your temporary voice channel
#[poise::command(slash_command, ephemeral = true)]
pub async fn name(
    ctx: PoiseContext<'_>,
    #[description = "The new channel name"] new_name: String,
) -> Result<()> {
    if owned_room(&ctx).await?.is_none() {
        return Ok(());
    }

    if !(2..=100).contains(&new_name.chars().count()) {
        ctx.say("The name must be 2 to 100 characters").await?;
        return Ok(());
    }

    ctx.channel_id()
        .edit(ctx, EditChannel::new().name(&new_name))
        .await?;

    ctx.say(format!("Renamed to `{new_name}`")).await?;

    Ok(())
}

/// Change the user limit of your temporary voice channel
#[poise::command(slash_command, ephemeral = true)]
pub async fn limit(
    ctx: PoiseContext<'_>,
    #[min = 2] #[max = 99] #[description = "Maximum number of users"] limit: u32,
) -> Result<()> {
    if owned_room(&ctx).await?.is_none() {
        return Ok(());
    }

    ctx.channel_id()
        .edit(ctx, EditChannel::new().user_limit(limit))
        .await?;

    ctx.say(format!("User limit set to {limit}")).await?;

    Ok(())
}
