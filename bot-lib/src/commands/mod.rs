pub mod help;
pub mod leveling;
pub mod responses;
pub mod scramble;
pub mod settings;
pub mod streaks;
pub mod voice;
pub mod warnings;

use crate::data::PoiseContext;
use color_eyre::eyre::{OptionExt, Result};
use poise::serenity_prelude::GuildId;

/// All of these commands are guild commands, but poise's `guild_only`
/// still leaves the id optional in the type.
pub(crate) fn require_guild(ctx: &PoiseContext<'_>) -> Result<GuildId> {
    ctx.guild_id().ok_or_eyre("Couldn't get guild")
}
