//! Consecutive-daily-activity tracking. Days are counted as whole days
//! since the Unix epoch in the guild's configured timezone, so "midnight"
//! is the guild's midnight, not UTC's.

use crate::{ReadWriteTree, TanagerDb, guild_key_prefix};
use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use poise::serenity_prelude::{GuildId, UserId};
use serde::{Deserialize, Serialize};
use sled::Tree;

/// A streak survives a one-day gap (message yesterday, message today) and
/// dies on anything longer.
pub const STREAK_EXPIRY_GAP_DAYS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakRecord {
    pub start_day: i64,
    pub last_day: i64,
}

impl StreakRecord {
    pub fn started(today: i64) -> Self {
        Self {
            start_day: today,
            last_day: today,
        }
    }

    /// Streak length in days. The first day counts as zero.
    pub fn days(&self) -> i64 {
        (self.last_day - self.start_day).max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakUpdate {
    /// First qualifying message ever seen for this member.
    Started,
    /// Another message on an already-counted day.
    Unchanged { days: i64 },
    /// First message of a new consecutive day.
    Extended { days: i64 },
    /// The gap was too long. The previous streak length is reported once.
    Expired { lost: i64 },
}

/// Whole days since the epoch at the guild's UTC offset.
pub fn local_day(now: DateTime<Utc>, offset_hours: f64) -> i64 {
    let offset_seconds = (offset_hours * 3600.0) as i64;
    (now.timestamp() + offset_seconds).div_euclid(86400)
}

pub fn advance_record(
    record: Option<StreakRecord>,
    today: i64,
) -> (StreakRecord, StreakUpdate) {
    let Some(record) = record else {
        return (StreakRecord::started(today), StreakUpdate::Started);
    };

    if today - record.last_day >= STREAK_EXPIRY_GAP_DAYS {
        return (
            StreakRecord::started(today),
            StreakUpdate::Expired {
                lost: record.days(),
            },
        );
    }

    if today > record.last_day {
        let updated = StreakRecord {
            start_day: record.start_day,
            last_day: today,
        };
        return (
            updated,
            StreakUpdate::Extended {
                days: updated.days(),
            },
        );
    }

    (
        record,
        StreakUpdate::Unchanged {
            days: record.days(),
        },
    )
}

pub struct StreakDb(Tree);

impl StreakDb {
    pub fn new(db: &TanagerDb) -> Result<Self> {
        Ok(StreakDb(db.open_tree("chat_streaks")?))
    }

    pub fn advance(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        today: i64,
    ) -> Result<StreakUpdate> {
        let key = (guild_id.get(), user_id.get());
        let record = self.0.typed_get::<(u64, u64), StreakRecord>(&key)?;

        let (updated, outcome) = advance_record(record, today);
        self.0.typed_insert(&key, &updated)?;

        Ok(outcome)
    }

    pub fn reset(&self, guild_id: GuildId, user_id: UserId, today: i64) -> Result<()> {
        self.0.typed_insert(
            &(guild_id.get(), user_id.get()),
            &StreakRecord::started(today),
        )
    }

    pub fn current(&self, guild_id: GuildId, user_id: UserId) -> Result<Option<StreakRecord>> {
        self.0
            .typed_get::<(u64, u64), StreakRecord>(&(guild_id.get(), user_id.get()))
    }

    pub fn for_guild(&self, guild_id: GuildId) -> impl Iterator<Item = (UserId, StreakRecord)> {
        self.0
            .scan_prefix(guild_key_prefix(guild_id.get()))
            .filter_map(|entry| entry.ok())
            .filter_map(|(key, value)| {
                let (_, user_id) = bincode::deserialize::<(u64, u64)>(&key).ok()?;
                let record = bincode::deserialize::<StreakRecord>(&value).ok()?;
                Some((UserId::new(user_id), record))
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn local_day_respects_offset() {
        // 2024-03-01 23:30 UTC
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap();

        let utc_day = local_day(now, 0.0);
        // UTC+2 is already past midnight into the next day.
        assert_eq!(local_day(now, 2.0), utc_day + 1);
        // UTC-8 is still on the same day.
        assert_eq!(local_day(now, -8.0), utc_day);
        // Half-hour offsets work too.
        assert_eq!(local_day(now, 0.5), utc_day + 1);
    }

    #[test]
    fn first_message_starts_a_streak() {
        let (record, outcome) = advance_record(None, 100);

        assert_eq!(outcome, StreakUpdate::Started);
        assert_eq!(record, StreakRecord::started(100));
        assert_eq!(record.days(), 0);
    }

    #[test]
    fn same_day_is_unchanged() {
        let record = StreakRecord {
            start_day: 98,
            last_day: 100,
        };

        let (updated, outcome) = advance_record(Some(record), 100);

        assert_eq!(outcome, StreakUpdate::Unchanged { days: 2 });
        assert_eq!(updated, record);
    }

    #[test]
    fn next_day_extends() {
        let record = StreakRecord {
            start_day: 98,
            last_day: 100,
        };

        let (updated, outcome) = advance_record(Some(record), 101);

        assert_eq!(outcome, StreakUpdate::Extended { days: 3 });
        assert_eq!(updated.last_day, 101);
        assert_eq!(updated.start_day, 98);
    }

    #[test]
    fn missed_day_expires() {
        let record = StreakRecord {
            start_day: 90,
            last_day: 100,
        };

        let (updated, outcome) = advance_record(Some(record), 102);

        assert_eq!(outcome, StreakUpdate::Expired { lost: 10 });
        assert_eq!(updated, StreakRecord::started(102));
    }

    #[test]
    fn storage_roundtrip_and_guild_scan() {
        let db = TanagerDb::temporary().unwrap();
        let streaks = StreakDb::new(&db).unwrap();
        let guild = GuildId::new(7);

        assert_eq!(
            streaks.advance(guild, UserId::new(1), 100).unwrap(),
            StreakUpdate::Started
        );
        assert_eq!(
            streaks.advance(guild, UserId::new(1), 101).unwrap(),
            StreakUpdate::Extended { days: 1 }
        );
        streaks.advance(GuildId::new(8), UserId::new(2), 101).unwrap();

        let in_guild: Vec<_> = streaks.for_guild(guild).collect();
        assert_eq!(in_guild.len(), 1);
        assert_eq!(in_guild[0].0, UserId::new(1));
        assert_eq!(in_guild[0].1.days(), 1);

        streaks.reset(guild, UserId::new(1), 101).unwrap();
        assert_eq!(
            streaks.current(guild, UserId::new(1)).unwrap().unwrap().days(),
            0
        );
    }
}
