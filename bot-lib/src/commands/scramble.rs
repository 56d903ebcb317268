use super::require_guild;
use crate::{
    data::{AppState, PoiseContext, State},
    utils::{GetRelativeTimestamp, ReplyThenDelete},
};
use bot_db::settings::{SettingsDb, keys};
use bot_traits::TraceErr;
use chrono::{DateTime, TimeDelta, Utc};
use color_eyre::eyre::Result;
use dashmap::DashMap;
use itertools::Itertools;
use poise::serenity_prelude::{
    self as serenity, ChannelId, CreateMessage, EditMessage, GuildId, Mentionable, MessageId,
    RoleId,
};
use rand::{
    Rng,
    seq::{IndexedRandom, SliceRandom},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::LazyLock, time::Duration};
use tokio::time::interval;
use tokio_stream::wrappers::IntervalStream;

pub const SCRAMBLE_GAME_SECONDS: i64 = 300;
pub const SCHEDULER_TICK_SECONDS: u64 = 60;
pub const DEFAULT_XP_PER_SCRAMBLE: i64 = 100;
pub const MIN_WORD_LEN: u32 = 3;
pub const MAX_WORD_LEN: u32 = 20;

/// One running game per channel. In-memory only: a restart forfeits
/// running games, which at a five minute lifetime is fine.
static SCRAMBLE_GAMES: LazyLock<DashMap<ChannelId, ScrambleGame>> = LazyLock::new(DashMap::new);

#[derive(Clone)]
struct ScrambleGame {
    word: String,
    message_id: MessageId,
    expires_at: DateTime<Utc>,
}

/// Per-channel scheduler config, stored in guild settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrambleChannelConfig {
    /// One-in-`chance` roll per minute to start a game.
    pub chance: u32,
    pub min_len: u32,
    pub max_len: u32,
}

type ScrambleChannels = HashMap<u64, ScrambleChannelConfig>;

#[derive(Debug)]
pub struct WordList(Vec<String>);

impl WordList {
    /// Load a newline-separated word list, falling back to the built-in
    /// list when no path is given, the file is unreadable, or nothing
    /// usable is in it.
    pub fn load(path: Option<&str>) -> Self {
        let from_file = path.and_then(|path| {
            std::fs::read_to_string(path)
                .map_err(|e| tracing::warn!("Failed to read word list {path}: {e}"))
                .ok()
        });

        let words = from_file
            .map(|text| {
                text.lines()
                    .map(|line| line.trim().to_ascii_lowercase())
                    .filter(|word| {
                        !word.is_empty() && word.chars().all(|c| c.is_ascii_alphabetic())
                    })
                    .collect_vec()
            })
            .filter(|words| !words.is_empty())
            .unwrap_or_else(|| BUILT_IN_WORDS.iter().map(|word| word.to_string()).collect());

        WordList(words)
    }

    pub fn pick(&self, min_len: usize, max_len: usize) -> Option<&str> {
        let candidates = self
            .0
            .iter()
            .filter(|word| (min_len..=max_len).contains(&word.len()))
            .collect_vec();

        candidates.choose(&mut rand::rng()).map(|word| word.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn scramble_word(word: &str) -> String {
    let mut letters: Vec<char> = word.chars().collect();

    // A shuffle can reproduce the input; retry a few times. Words made of
    // one repeated letter can't be disguised at all.
    for _ in 0..16 {
        letters.shuffle(&mut rand::rng());
        let scrambled: String = letters.iter().collect();
        if scrambled != word {
            return scrambled;
        }
    }

    word.chars().rev().collect()
}

fn scramble_channels(data: &AppState, guild_id: GuildId) -> Result<ScrambleChannels> {
    SettingsDb::new(&data.db)?.get_or(guild_id, keys::SCRAMBLE_CHANNELS, ScrambleChannels::new())
}

async fn begin_game(
    ctx: &serenity::Context,
    data: &AppState,
    guild_id: GuildId,
    channel_id: ChannelId,
    word: String,
) -> Result<()> {
    let ping_role = SettingsDb::new(&data.db)?.get::<u64>(guild_id, keys::SCRAMBLE_PING_ROLE)?;
    let expires_at = Utc::now() + TimeDelta::seconds(SCRAMBLE_GAME_SECONDS);

    let mut content = format!(
        "# Word Scramble!\nUnscramble the word below:\n\n`{}`\n\nGame ends {}",
        scramble_word(&word),
        expires_at.discord_relative_timestamp()
    );
    if let Some(role) = ping_role {
        content.push_str(&format!("\n{}", RoleId::new(role).mention()));
    }

    let message = channel_id
        .send_message(ctx, CreateMessage::new().content(content))
        .await?;

    tracing::info!("Started word scramble in {channel_id} ({} letters)", word.len());

    SCRAMBLE_GAMES.insert(
        channel_id,
        ScrambleGame {
            word,
            message_id: message.id,
            expires_at,
        },
    );

    Ok(())
}

static GUESS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-zA-Z]+$").expect("Guess pattern must parse"));

pub async fn handle_guess(
    ctx: &serenity::Context,
    data: &State,
    message: &serenity::Message,
) -> Result<()> {
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };

    let guess = message.content.trim();
    if !GUESS_REGEX.is_match(guess) {
        return Ok(());
    }

    // Removing the entry is what declares the winner; a concurrent second
    // guess finds the map empty and counts for nothing.
    let Some((_, game)) = SCRAMBLE_GAMES.remove_if(&message.channel_id, |_, game| {
        game.expires_at >= Utc::now() && game.word.eq_ignore_ascii_case(guess)
    }) else {
        return Ok(());
    };

    message
        .channel_id
        .edit_message(
            ctx,
            game.message_id,
            EditMessage::new().content(format!(
                "# Word Scramble!\n\nWon by {}\nThe word was: `{}`",
                message.author.mention(),
                game.word
            )),
        )
        .await
        .trace_warn_ok();

    let xp = SettingsDb::new(&data.db)?.get_or(
        guild_id,
        keys::XP_PER_SCRAMBLE,
        DEFAULT_XP_PER_SCRAMBLE,
    )?;

    let acknowledgement = if xp > 0 {
        format!("Correct! The word was `{}`\nYou earned {xp} XP!", game.word)
    } else {
        format!("Correct! The word was `{}`", game.word)
    };
    message
        .reply_then_delete(ctx, acknowledgement, Duration::from_secs(5))
        .await?;

    if xp > 0 {
        let (before, after) = super::leveling::grant_xp(data, guild_id, message.author.id, xp)?;
        if after > before {
            message
                .reply_then_delete(
                    ctx,
                    format!("🎉 {} reached level {after}!", message.author.mention()),
                    Duration::from_secs(5),
                )
                .await?;
        }
    }

    Ok(())
}

/// Runs for the lifetime of the bot: ends overdue games and rolls the
/// per-channel dice for starting new ones.
pub async fn run_scheduler(ctx: serenity::Context, data: State) {
    use futures::StreamExt;

    IntervalStream::new(interval(Duration::from_secs(SCHEDULER_TICK_SECONDS)))
        .for_each(|_| async {
            expire_games(&ctx).await;
            start_random_games(&ctx, &data).await.trace_err_ok();
        })
        .await
}

async fn expire_games(ctx: &serenity::Context) {
    let now = Utc::now();

    let overdue = SCRAMBLE_GAMES
        .iter()
        .filter(|entry| entry.value().expires_at < now)
        .map(|entry| *entry.key())
        .collect_vec();

    for channel_id in overdue {
        let Some((_, game)) =
            SCRAMBLE_GAMES.remove_if(&channel_id, |_, game| game.expires_at < now)
        else {
            continue;
        };

        tracing::debug!("Word scramble in {channel_id} expired");

        channel_id
            .edit_message(
                ctx,
                game.message_id,
                EditMessage::new().content(format!(
                    "# Word Scramble!\n\nGame over! The word was: `{}`. Better luck next time!",
                    game.word
                )),
            )
            .await
            .trace_warn_ok();
    }
}

async fn start_random_games(ctx: &serenity::Context, data: &AppState) -> Result<()> {
    for guild_id in ctx.cache.guilds() {
        for (channel_id, config) in scramble_channels(data, guild_id)? {
            let channel_id = ChannelId::new(channel_id);

            if SCRAMBLE_GAMES.contains_key(&channel_id) {
                continue;
            }
            if config.chance == 0 || rand::rng().random_range(1..=config.chance) != 1 {
                continue;
            }

            let Some(word) = data
                .words
                .pick(config.min_len as usize, config.max_len as usize)
                .map(str::to_owned)
            else {
                tracing::warn!(
                    "No words between {} and {} letters for the scramble in {channel_id}",
                    config.min_len,
                    config.max_len
                );
                continue;
            };

            begin_game(ctx, data, guild_id, channel_id, word)
                .await
                .trace_warn_ok();
        }
    }

    Ok(())
}

/// Word scramble controls and configuration
#[poise::command(
    slash_command,
    guild_only,
    subcommands("start", "end", "set_channel", "remove_channel", "set_xp", "set_role")
)]
pub async fn scramble(_ctx: PoiseContext<'_>) -> Result<()> {
    Ok(())
}

/// Force start a game in this channel
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_MESSAGES")]
pub async fn start(ctx: PoiseContext<'_>) -> Result<()> {
    let guild_id = require_guild(&ctx)?;
    let channel_id = ctx.channel_id();

    if SCRAMBLE_GAMES.contains_key(&channel_id) {
        ctx.say("A game is already running in this channel").await?;
        return Ok(());
    }

    let (min_len, max_len) = scramble_channels(ctx.data(), guild_id)?
        .get(&channel_id.get())
        .map_or((MIN_WORD_LEN, MAX_WORD_LEN), |config| {
            (config.min_len, config.max_len)
        });

    let Some(word) = ctx
        .data()
        .words
        .pick(min_len as usize, max_len as usize)
        .map(str::to_owned)
    else {
        ctx.say("No suitable words in the word list").await?;
        return Ok(());
    };

    begin_game(ctx.serenity_context(), ctx.data(), guild_id, channel_id, word).await?;
    ctx.say("Word scramble started").await?;

    Ok(())
}

/// Force end the game in this channel
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_MESSAGES")]
pub async fn end(ctx: PoiseContext<'_>) -> Result<()> {
    let Some((channel_id, game)) = SCRAMBLE_GAMES.remove(&ctx.channel_id()) else {
        ctx.say("No game is running in this channel").await?;
        return Ok(());
    };

    channel_id
        .edit_message(
            ctx,
            game.message_id,
            EditMessage::new().content(format!(
                "# Word Scramble!\n\nGame ended early by {}. The word was: `{}`",
                ctx.author().mention(),
                game.word
            )),
        )
        .await
        .trace_warn_ok();

    ctx.say("Word scramble ended").await?;

    Ok(())
}

/// Let the scheduler start games in a channel
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_MESSAGES")]
pub async fn set_channel(
    ctx: PoiseContext<'_>,
    #[channel_types("Text")] channel: serenity::Channel,
    #[min = 1]
    #[description = "One-in-what chance to start per minute (higher = rarer)"]
    chance: u32,
    #[min = 3] #[max = 20] min_len: u32,
    #[min = 3] #[max = 20] max_len: u32,
) -> Result<()> {
    let guild_id = require_guild(&ctx)?;

    if min_len > max_len {
        ctx.say("Minimum word length can't exceed the maximum").await?;
        return Ok(());
    }

    let channel_id = channel.id();
    let settings = SettingsDb::new(&ctx.data().db)?;
    let mut channels = scramble_channels(ctx.data(), guild_id)?;
    channels.insert(
        channel_id.get(),
        ScrambleChannelConfig {
            chance,
            min_len,
            max_len,
        },
    );
    settings.set(guild_id, keys::SCRAMBLE_CHANNELS, &channels)?;

    ctx.say(format!(
        "{} set up: 1 in {chance} chance per minute, {min_len} to {max_len} letters",
        channel_id.mention()
    ))
    .await?;

    Ok(())
}

/// Stop the scheduler from starting games in a channel
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_MESSAGES")]
pub async fn remove_channel(
    ctx: PoiseContext<'_>,
    #[channel_types("Text")] channel: serenity::Channel,
) -> Result<()> {
    let guild_id = require_guild(&ctx)?;
    let settings = SettingsDb::new(&ctx.data().db)?;

    let mut channels = scramble_channels(ctx.data(), guild_id)?;
    if channels.remove(&channel.id().get()).is_none() {
        ctx.say("That channel isn't set up for word scrambles").await?;
        return Ok(());
    }
    settings.set(guild_id, keys::SCRAMBLE_CHANNELS, &channels)?;

    ctx.say(format!("Removed {}", channel.id().mention())).await?;

    Ok(())
}

/// Show or set the XP awarded per won game
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_MESSAGES")]
pub async fn set_xp(
    ctx: PoiseContext<'_>,
    #[min = 0] #[description = "XP per game won (0 disables XP)"] xp: Option<i64>,
) -> Result<()> {
    let guild_id = require_guild(&ctx)?;
    let settings = SettingsDb::new(&ctx.data().db)?;

    let Some(xp) = xp else {
        let current =
            settings.get_or(guild_id, keys::XP_PER_SCRAMBLE, DEFAULT_XP_PER_SCRAMBLE)?;
        ctx.say(format!("Current XP per game: {current}")).await?;
        return Ok(());
    };

    settings.set(guild_id, keys::XP_PER_SCRAMBLE, &xp)?;
    ctx.say(format!("XP per game set to {xp}")).await?;

    Ok(())
}

/// Set or clear the role pinged when a game starts
#[poise::command(slash_command, ephemeral = true, required_permissions = "MANAGE_MESSAGES")]
pub async fn set_role(ctx: PoiseContext<'_>, role: Option<serenity::Role>) -> Result<()> {
    let guild_id = require_guild(&ctx)?;
    let settings = SettingsDb::new(&ctx.data().db)?;

    match role {
        Some(role) => {
            settings.set(guild_id, keys::SCRAMBLE_PING_ROLE, &role.id.get())?;
            ctx.say(format!("Games will ping {}", role.mention())).await?;
        }
        None => {
            settings.unset(guild_id, keys::SCRAMBLE_PING_ROLE)?;
            ctx.say("Games won't ping a role").await?;
        }
    }

    Ok(())
}

#[rustfmt::skip]
const BUILT_IN_WORDS: &[&str] = &[
    "apple", "anchor", "autumn", "banana", "basket", "breeze", "bridge",
    "candle", "canyon", "carpet", "castle", "cherry", "circle", "copper",
    "cradle", "dragon", "engine", "falcon", "feather", "forest", "garden",
    "glacier", "guitar", "hammer", "harbor", "island", "jungle", "kettle",
    "lantern", "lemon", "magnet", "marble", "meadow", "mirror", "mountain",
    "needle", "orange", "orchid", "pebble", "pencil", "pepper", "pillow",
    "planet", "pocket", "puzzle", "rabbit", "ribbon", "river", "rocket",
    "saddle", "shadow", "silver", "spider", "spring", "stream", "sunset",
    "thunder", "ticket", "timber", "turtle", "valley", "velvet", "violet",
    "walnut", "window", "winter", "wonder", "yellow", "zephyr",
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scrambled_word_keeps_its_letters() {
        let scrambled = scramble_word("banana");

        assert_eq!(scrambled.len(), 6);

        let mut original: Vec<char> = "banana".chars().collect();
        let mut shuffled: Vec<char> = scrambled.chars().collect();
        original.sort_unstable();
        shuffled.sort_unstable();
        assert_eq!(original, shuffled);
    }

    #[test]
    fn scrambled_word_differs_when_possible() {
        for _ in 0..20 {
            assert_ne!(scramble_word("puzzle"), "puzzle");
        }
    }

    #[test]
    fn built_in_word_list_is_usable() {
        let words = WordList::load(None);

        assert!(!words.is_empty());

        let word = words.pick(3, 20).unwrap();
        assert!((3..=20).contains(&word.len()));
    }

    #[test]
    fn pick_honors_length_bounds() {
        let words = WordList::load(None);

        for _ in 0..20 {
            let word = words.pick(6, 6).unwrap();
            assert_eq!(word.len(), 6);
        }

        // Nothing in the list is this long.
        assert_eq!(words.pick(25, 30), None);
    }

    #[test]
    fn missing_word_list_file_falls_back() {
        let words = WordList::load(Some("/nonexistent/words.txt"));

        assert_eq!(words.len(), WordList::load(None).len());
    }
}
