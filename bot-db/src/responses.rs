//! Per-guild trigger -> reply pairs. Matching is a case-insensitive
//! substring check; only the lowest-id matching pair replies, so stacked
//! triggers can't turn one message into a reply storm.

use crate::{ReadWriteTree, TanagerDb, guild_key_prefix};
use color_eyre::eyre::Result;
use itertools::Itertools;
use poise::serenity_prelude::GuildId;
use serde::{Deserialize, Serialize};
use sled::Tree;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoResponse {
    pub trigger: String,
    pub reply: String,
}

pub struct ResponseDb<'db> {
    tree: Tree,
    db: &'db TanagerDb,
}

impl<'db> ResponseDb<'db> {
    pub fn new(db: &'db TanagerDb) -> Result<Self> {
        Ok(ResponseDb {
            tree: db.open_tree("auto_responses")?,
            db,
        })
    }

    pub fn add(&self, guild_id: GuildId, trigger: String, reply: String) -> Result<u64> {
        let id = self.db.generate_id()?;
        self.tree.typed_insert::<(u64, u64), AutoResponse>(
            &(guild_id.get(), id),
            &AutoResponse { trigger, reply },
        )?;

        Ok(id)
    }

    pub fn get(&self, guild_id: GuildId, id: u64) -> Result<Option<AutoResponse>> {
        self.tree
            .typed_get::<(u64, u64), AutoResponse>(&(guild_id.get(), id))
    }

    pub fn update(&self, guild_id: GuildId, id: u64, response: &AutoResponse) -> Result<()> {
        self.tree
            .typed_insert::<(u64, u64), AutoResponse>(&(guild_id.get(), id), response)
    }

    pub fn remove(&self, guild_id: GuildId, id: u64) -> Result<bool> {
        Ok(self
            .tree
            .remove(bincode::serialize(&(guild_id.get(), id))?)?
            .is_some())
    }

    /// All pairs for a guild, in id order. Small collections; the sort is
    /// needed because bincode's little-endian keys don't sort numerically.
    pub fn list(&self, guild_id: GuildId) -> Vec<(u64, AutoResponse)> {
        self.tree
            .scan_prefix(guild_key_prefix(guild_id.get()))
            .filter_map(|entry| entry.ok())
            .filter_map(|(key, value)| {
                let (_, id) = bincode::deserialize::<(u64, u64)>(&key).ok()?;
                let response = bincode::deserialize::<AutoResponse>(&value).ok()?;
                Some((id, response))
            })
            .sorted_by_key(|(id, _)| *id)
            .collect()
    }

    pub fn find_reply(&self, guild_id: GuildId, content: &str) -> Option<String> {
        let content = content.to_lowercase();

        self.list(guild_id)
            .into_iter()
            .find(|(_, response)| {
                !response.trigger.is_empty()
                    && content.contains(&response.trigger.to_lowercase())
            })
            .map(|(_, response)| response.reply)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_matching_pair_wins() {
        let db = TanagerDb::temporary().unwrap();
        let responses = ResponseDb::new(&db).unwrap();
        let guild = GuildId::new(1);

        responses
            .add(guild, "hello".into(), "hi there".into())
            .unwrap();
        responses
            .add(guild, "hello world".into(), "second".into())
            .unwrap();

        assert_eq!(
            responses.find_reply(guild, "well, hello world"),
            Some("hi there".into())
        );
        assert_eq!(responses.find_reply(guild, "goodbye"), None);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let db = TanagerDb::temporary().unwrap();
        let responses = ResponseDb::new(&db).unwrap();
        let guild = GuildId::new(1);

        responses
            .add(guild, "Ping".into(), "pong".into())
            .unwrap();

        assert_eq!(
            responses.find_reply(guild, "PING me please"),
            Some("pong".into())
        );
    }

    #[test]
    fn edit_and_remove() {
        let db = TanagerDb::temporary().unwrap();
        let responses = ResponseDb::new(&db).unwrap();
        let guild = GuildId::new(1);

        let id = responses.add(guild, "abc".into(), "def".into()).unwrap();

        responses
            .update(
                guild,
                id,
                &AutoResponse {
                    trigger: "xyz".into(),
                    reply: "uvw".into(),
                },
            )
            .unwrap();
        assert_eq!(responses.find_reply(guild, "xyz!"), Some("uvw".into()));
        assert_eq!(responses.find_reply(guild, "abc!"), None);

        assert!(responses.remove(guild, id).unwrap());
        assert!(!responses.remove(guild, id).unwrap());
        assert!(responses.list(guild).is_empty());
    }

    #[test]
    fn pairs_are_per_guild() {
        let db = TanagerDb::temporary().unwrap();
        let responses = ResponseDb::new(&db).unwrap();

        responses
            .add(GuildId::new(1), "hey".into(), "ho".into())
            .unwrap();

        assert_eq!(responses.find_reply(GuildId::new(2), "hey"), None);
    }
}
