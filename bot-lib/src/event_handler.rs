use crate::{
    commands::{leveling, responses, scramble, streaks, voice},
    data::State,
};
use bot_traits::TraceErr;
use color_eyre::eyre::Result;
use poise::serenity_prelude as serenity;

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, State, color_eyre::eyre::Error>,
    data: &State,
) -> Result<()> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            if new_message.author.bot || new_message.guild_id.is_none() {
                return Ok(());
            }

            // Every feature sees every message; one failing must not
            // starve the rest.
            responses::handle_message(ctx, data, new_message)
                .await
                .trace_err_ok();
            scramble::handle_guess(ctx, data, new_message)
                .await
                .trace_err_ok();
            streaks::handle_message(ctx, data, new_message)
                .await
                .trace_err_ok();
            leveling::handle_message(ctx, data, new_message)
                .await
                .trace_err_ok();
        }
        serenity::FullEvent::VoiceStateUpdate { old, new } => {
            voice::handle_voice_state_update(ctx, data, old.as_ref(), new)
                .await
                .trace_err_ok();
        }
        serenity::FullEvent::Ratelimit { data } => {
            tracing::warn!("Ratelimited: {:?}", data);
        }
        _ => {}
    };

    Ok(())
}
