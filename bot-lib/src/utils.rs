use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use poise::serenity_prelude as serenity;

pub trait GetRelativeTimestamp {
    fn discord_relative_timestamp(&self) -> String;
}

impl GetRelativeTimestamp for DateTime<Utc> {
    fn discord_relative_timestamp(&self) -> String {
        format!("<t:{}:R>", self.timestamp())
    }
}

/// Reply to a message and clean the reply up shortly after, so streak and
/// level chatter doesn't pile up in busy channels. The delete happens on a
/// spawned task; the caller doesn't wait for it.
pub trait ReplyThenDelete {
    async fn reply_then_delete(
        &self,
        ctx: &serenity::Context,
        content: impl Into<String>,
        after: Duration,
    ) -> Result<()>;
}

impl ReplyThenDelete for serenity::Message {
    async fn reply_then_delete(
        &self,
        ctx: &serenity::Context,
        content: impl Into<String>,
        after: Duration,
    ) -> Result<()> {
        let reply = self.reply(ctx, content.into()).await?;
        let http = Arc::clone(&ctx.http);

        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            reply.delete(&http).await.ok();
        });

        Ok(())
    }
}
