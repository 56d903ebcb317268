//! Per-member warning book. One document per (guild, member) holding the
//! full history, with per-member sequential ids so moderators can point
//! at a specific entry to remove.

use crate::{ReadWriteTree, TanagerDb};
use color_eyre::eyre::Result;
use poise::serenity_prelude::{GuildId, UserId};
use serde::{Deserialize, Serialize};
use sled::Tree;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub id: u64,
    pub reason: String,
    pub moderator: u64,
    pub issued_at: i64,
}

pub struct WarningsDb(Tree);

impl WarningsDb {
    pub fn new(db: &TanagerDb) -> Result<Self> {
        Ok(WarningsDb(db.open_tree("warnings")?))
    }

    pub fn add(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        moderator: UserId,
        reason: String,
        issued_at: i64,
    ) -> Result<Warning> {
        let key = (guild_id.get(), user_id.get());
        let mut warnings = self
            .0
            .typed_get_or_default::<(u64, u64), Vec<Warning>>(&key)?;

        let warning = Warning {
            id: warnings.last().map_or(1, |last| last.id + 1),
            reason,
            moderator: moderator.get(),
            issued_at,
        };

        warnings.push(warning.clone());
        self.0.typed_insert(&key, &warnings)?;

        Ok(warning)
    }

    pub fn remove(&self, guild_id: GuildId, user_id: UserId, id: u64) -> Result<bool> {
        let key = (guild_id.get(), user_id.get());
        let mut warnings = self
            .0
            .typed_get_or_default::<(u64, u64), Vec<Warning>>(&key)?;

        let before = warnings.len();
        warnings.retain(|warning| warning.id != id);

        if warnings.len() == before {
            return Ok(false);
        }

        self.0.typed_insert(&key, &warnings)?;
        Ok(true)
    }

    pub fn list(&self, guild_id: GuildId, user_id: UserId) -> Result<Vec<Warning>> {
        self.0
            .typed_get_or_default::<(u64, u64), Vec<Warning>>(&(guild_id.get(), user_id.get()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_are_sequential_per_member() {
        let db = TanagerDb::temporary().unwrap();
        let warnings = WarningsDb::new(&db).unwrap();
        let guild = GuildId::new(1);
        let moderator = UserId::new(99);

        let first = warnings
            .add(guild, UserId::new(10), moderator, "spam".into(), 1000)
            .unwrap();
        let second = warnings
            .add(guild, UserId::new(10), moderator, "more spam".into(), 2000)
            .unwrap();
        let other = warnings
            .add(guild, UserId::new(11), moderator, "rude".into(), 3000)
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(other.id, 1);
        assert_eq!(warnings.list(guild, UserId::new(10)).unwrap().len(), 2);
    }

    #[test]
    fn remove_by_id() {
        let db = TanagerDb::temporary().unwrap();
        let warnings = WarningsDb::new(&db).unwrap();
        let guild = GuildId::new(1);
        let user = UserId::new(10);
        let moderator = UserId::new(99);

        warnings
            .add(guild, user, moderator, "spam".into(), 1000)
            .unwrap();
        warnings
            .add(guild, user, moderator, "flood".into(), 2000)
            .unwrap();

        assert!(warnings.remove(guild, user, 1).unwrap());
        assert!(!warnings.remove(guild, user, 1).unwrap());

        let remaining = warnings.list(guild, user).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].reason, "flood");

        // Ids keep counting from the highest surviving entry.
        let next = warnings
            .add(guild, user, moderator, "again".into(), 3000)
            .unwrap();
        assert_eq!(next.id, 3);
    }
}
