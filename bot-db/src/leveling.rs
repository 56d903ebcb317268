//! XP accumulation and the level curve. XP totals are plain counters per
//! (guild, member); the interesting parts are the seasonal multipliers
//! and the repeated-subtraction level arithmetic, both pure.

use crate::{ReadWriteTree, TanagerDb, guild_key_prefix};
use chrono::{DateTime, Datelike, TimeDelta, Utc};
use color_eyre::eyre::Result;
use poise::serenity_prelude::{GuildId, UserId};
use serde::{Deserialize, Serialize};
use sled::Tree;

/// A named seasonal XP multiplier, active between two month/day points
/// every year. A window whose end precedes its start wraps across New
/// Year (Dec 20 – Jan 5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multiplier {
    pub name: String,
    pub factor: i64,
    /// (month, day), inclusive.
    pub start: (u32, u32),
    /// (month, day), inclusive.
    pub end: (u32, u32),
}

impl Multiplier {
    pub fn is_active(&self, month_day: (u32, u32)) -> bool {
        if self.start <= self.end {
            self.start <= month_day && month_day <= self.end
        } else {
            month_day >= self.start || month_day <= self.end
        }
    }
}

/// (month, day) of `now` shifted into the guild's timezone.
pub fn local_month_day(now: DateTime<Utc>, offset_hours: f64) -> (u32, u32) {
    let offset_seconds = (offset_hours * 3600.0) as i64;
    let local = now + TimeDelta::seconds(offset_seconds);
    (local.month(), local.day())
}

pub fn effective_multiplier(
    base: i64,
    multipliers: &[Multiplier],
    month_day: (u32, u32),
) -> i64 {
    multipliers
        .iter()
        .filter(|multiplier| multiplier.is_active(month_day))
        .fold(base, |product, multiplier| product * multiplier.factor)
}

/// Level reached with `xp`, by repeated subtraction of the per-level cost.
pub fn level_for_xp(mut xp: i64, xp_per_level: i64) -> i64 {
    if xp_per_level <= 0 {
        return 0;
    }

    let mut level = 0;
    while xp >= xp_per_level {
        level += 1;
        xp -= xp_per_level;
    }

    level
}

/// Inverse of [`level_for_xp`]: total XP required to reach `level`.
pub fn xp_for_level(level: i64, xp_per_level: i64) -> i64 {
    if xp_per_level <= 0 {
        return 0;
    }

    level.max(0) * xp_per_level
}

pub struct XpDb(Tree);

impl XpDb {
    pub fn new(db: &TanagerDb) -> Result<Self> {
        let db = db.open_tree("leveling_xp")?;

        fn add(_key: &[u8], old_value: Option<&[u8]>, merged_bytes: &[u8]) -> Option<Vec<u8>> {
            TanagerDb::create_update_with_deserialization::<i64>(
                old_value,
                |total| {
                    let Ok(delta) = bincode::deserialize::<i64>(merged_bytes) else {
                        tracing::error!("Failed to deserialize xp delta, {:?}", merged_bytes);
                        return total;
                    };

                    total.saturating_add(delta)
                },
                || 0,
            )
        }

        db.set_merge_operator(add);

        Ok(XpDb(db))
    }

    pub fn add(&self, guild_id: GuildId, user_id: UserId, amount: i64) -> Result<i64> {
        Ok(self
            .0
            .typed_merge::<(u64, u64), i64>(&(guild_id.get(), user_id.get()), &amount)?
            .unwrap_or(0))
    }

    pub fn get(&self, guild_id: GuildId, user_id: UserId) -> Result<i64> {
        self.0
            .typed_get_or_default::<(u64, u64), i64>(&(guild_id.get(), user_id.get()))
    }

    pub fn for_guild(&self, guild_id: GuildId) -> impl Iterator<Item = (UserId, i64)> {
        self.0
            .scan_prefix(guild_key_prefix(guild_id.get()))
            .filter_map(|entry| entry.ok())
            .filter_map(|(key, value)| {
                let (_, user_id) = bincode::deserialize::<(u64, u64)>(&key).ok()?;
                let xp = bincode::deserialize::<i64>(&value).ok()?;
                Some((UserId::new(user_id), xp))
            })
    }
}

pub struct MultiplierDb(Tree);

impl MultiplierDb {
    pub fn new(db: &TanagerDb) -> Result<Self> {
        Ok(MultiplierDb(db.open_tree("leveling_multipliers")?))
    }

    pub fn insert(&self, guild_id: GuildId, multiplier: &Multiplier) -> Result<()> {
        self.0.typed_insert::<(u64, &str), Multiplier>(
            &(guild_id.get(), &multiplier.name),
            multiplier,
        )
    }

    pub fn get(&self, guild_id: GuildId, name: &str) -> Result<Option<Multiplier>> {
        self.0
            .typed_get::<(u64, &str), Multiplier>(&(guild_id.get(), name))
    }

    pub fn remove(&self, guild_id: GuildId, name: &str) -> Result<bool> {
        Ok(self
            .0
            .remove(bincode::serialize(&(guild_id.get(), name))?)?
            .is_some())
    }

    pub fn list(&self, guild_id: GuildId) -> Vec<Multiplier> {
        self.0
            .scan_prefix(guild_key_prefix(guild_id.get()))
            .filter_map(|entry| entry.ok())
            .filter_map(|(_, value)| bincode::deserialize::<Multiplier>(&value).ok())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn multiplier(factor: i64, start: (u32, u32), end: (u32, u32)) -> Multiplier {
        Multiplier {
            name: "event".into(),
            factor,
            start,
            end,
        }
    }

    #[test]
    fn window_within_one_year() {
        let summer = multiplier(2, (6, 1), (8, 31));

        assert!(summer.is_active((6, 1)));
        assert!(summer.is_active((7, 15)));
        assert!(summer.is_active((8, 31)));
        assert!(!summer.is_active((5, 31)));
        assert!(!summer.is_active((9, 1)));
    }

    #[test]
    fn window_wraps_new_year() {
        let holidays = multiplier(3, (12, 20), (1, 5));

        assert!(holidays.is_active((12, 20)));
        assert!(holidays.is_active((12, 31)));
        assert!(holidays.is_active((1, 1)));
        assert!(holidays.is_active((1, 5)));
        assert!(!holidays.is_active((1, 6)));
        assert!(!holidays.is_active((12, 19)));
    }

    #[test]
    fn multipliers_stack_multiplicatively() {
        let multipliers = vec![
            multiplier(2, (6, 1), (8, 31)),
            multiplier(3, (12, 20), (1, 5)),
        ];

        assert_eq!(effective_multiplier(1, &multipliers, (7, 1)), 2);
        assert_eq!(effective_multiplier(1, &multipliers, (12, 25)), 3);
        assert_eq!(effective_multiplier(2, &multipliers, (12, 25)), 6);
        assert_eq!(effective_multiplier(1, &multipliers, (3, 1)), 1);
    }

    #[test]
    fn level_curve() {
        assert_eq!(level_for_xp(0, 500), 0);
        assert_eq!(level_for_xp(499, 500), 0);
        assert_eq!(level_for_xp(500, 500), 1);
        assert_eq!(level_for_xp(1250, 500), 2);
        assert_eq!(xp_for_level(2, 500), 1000);
        assert_eq!(level_for_xp(xp_for_level(7, 500), 500), 7);

        // A broken per-level cost must not hang or divide by zero.
        assert_eq!(level_for_xp(1000, 0), 0);
    }

    #[test]
    fn local_month_day_shifts_across_midnight() {
        use chrono::TimeZone;

        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 30, 0).unwrap();

        assert_eq!(local_month_day(now, 0.0), (12, 31));
        assert_eq!(local_month_day(now, 1.0), (1, 1));
    }

    #[test]
    fn xp_accumulates_through_merge() {
        let db = TanagerDb::temporary().unwrap();
        let xp = XpDb::new(&db).unwrap();
        let guild = GuildId::new(1);
        let user = UserId::new(2);

        xp.add(guild, user, 3).unwrap();
        xp.add(guild, user, 9).unwrap();

        assert_eq!(xp.get(guild, user).unwrap(), 12);
        assert_eq!(xp.get(guild, UserId::new(3)).unwrap(), 0);

        let all: Vec<_> = xp.for_guild(guild).collect();
        assert_eq!(all, vec![(user, 12)]);
    }

    #[test]
    fn multiplier_store_roundtrip() {
        let db = TanagerDb::temporary().unwrap();
        let multipliers = MultiplierDb::new(&db).unwrap();
        let guild = GuildId::new(1);

        multipliers
            .insert(guild, &multiplier(2, (6, 1), (8, 31)))
            .unwrap();

        assert_eq!(multipliers.list(guild).len(), 1);
        assert!(multipliers.get(guild, "event").unwrap().is_some());
        assert!(multipliers.remove(guild, "event").unwrap());
        assert!(!multipliers.remove(guild, "event").unwrap());
        assert!(multipliers.list(guild).is_empty());
    }
}
