use super::require_guild;
use crate::data::PoiseContext;
use bot_db::settings::{SettingsDb, keys};
use color_eyre::eyre::Result;

/// Per-guild bot settings
#[poise::command(slash_command, guild_only, subcommands("timezone"))]
pub async fn settings(_ctx: PoiseContext<'_>) -> Result<()> {
    Ok(())
}

/// Show or set the guild's UTC offset, used for day boundaries
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_GUILD")]
pub async fn timezone(
    ctx: PoiseContext<'_>,
    #[description = "UTC offset in hours, like 2 or -7.5"] offset: Option<f64>,
) -> Result<()> {
    let guild_id = require_guild(&ctx)?;
    let settings = SettingsDb::new(&ctx.data().db)?;

    let Some(offset) = offset else {
        let current = settings.get_or(guild_id, keys::TIMEZONE_OFFSET, 0.0)?;
        ctx.say(format!("Current timezone offset: UTC{current:+}"))
            .await?;
        return Ok(());
    };

    if !(-12.0..=14.0).contains(&offset) {
        ctx.say("Timezone offset must be between -12 and +14 hours")
            .await?;
        return Ok(());
    }

    settings.set(guild_id, keys::TIMEZONE_OFFSET, &offset)?;
    tracing::info!("{} set timezone offset to {offset} for {guild_id}", ctx.author().tag());

    ctx.say(format!("Timezone offset set to UTC{offset:+}")).await?;

    Ok(())
}
