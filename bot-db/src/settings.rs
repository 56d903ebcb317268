//! Per-guild key-value settings, the leaf dependency of nearly every
//! feature. Values are bincode-typed per call site; a value that is
//! missing (or was written under an incompatible shape) falls back to the
//! caller's default instead of failing the feature.

use crate::{ReadWriteTree, TanagerDb};
use color_eyre::eyre::Result;
use poise::serenity_prelude::GuildId;
use serde::{Serialize, de::DeserializeOwned};
use sled::Tree;

/// Well-known setting names. Defaults live at the call sites, not in the
/// database, so an untouched guild costs no storage.
pub mod keys {
    pub const TIMEZONE_OFFSET: &str = "timezone_offset";
    pub const XP_PER_LEVEL: &str = "xp_per_level";
    pub const XP_PER_MESSAGE: &str = "xp_per_message";
    pub const BASE_XP_MULTIPLIER: &str = "base_xp_multiplier";
    pub const XP_PER_SCRAMBLE: &str = "xp_per_scramble";
    pub const SCRAMBLE_CHANNELS: &str = "scramble_channels";
    pub const SCRAMBLE_PING_ROLE: &str = "scramble_ping_role";
    pub const VC_NAME_TEMPLATE: &str = "vc_name_template";
}

pub struct SettingsDb(Tree);

impl SettingsDb {
    pub fn new(db: &TanagerDb) -> Result<Self> {
        Ok(SettingsDb(db.open_tree("guild_settings")?))
    }

    pub fn get<T: DeserializeOwned + Serialize>(
        &self,
        guild_id: GuildId,
        key: &str,
    ) -> Result<Option<T>> {
        self.0.typed_get::<(u64, &str), T>(&(guild_id.get(), key))
    }

    /// Type-erased default fallback: absent keys and values that no longer
    /// decode as `T` both yield `default`.
    pub fn get_or<T: DeserializeOwned + Serialize>(
        &self,
        guild_id: GuildId,
        key: &str,
        default: T,
    ) -> Result<T> {
        let raw_key = bincode::serialize(&(guild_id.get(), key))?;

        Ok(self
            .0
            .get(raw_key)?
            .and_then(|value| bincode::deserialize::<T>(&value).ok())
            .unwrap_or(default))
    }

    pub fn set<T: DeserializeOwned + Serialize>(
        &self,
        guild_id: GuildId,
        key: &str,
        value: &T,
    ) -> Result<()> {
        self.0
            .typed_insert::<(u64, &str), T>(&(guild_id.get(), key), value)
    }

    pub fn unset(&self, guild_id: GuildId, key: &str) -> Result<()> {
        self.0.remove(bincode::serialize(&(guild_id.get(), key))?)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn settings() -> SettingsDb {
        SettingsDb::new(&TanagerDb::temporary().unwrap()).unwrap()
    }

    #[test]
    fn missing_key_falls_back() {
        let settings = settings();
        let guild = GuildId::new(1);

        assert_eq!(
            settings.get_or(guild, keys::TIMEZONE_OFFSET, 0.0).unwrap(),
            0.0
        );
        assert_eq!(
            settings.get::<f64>(guild, keys::TIMEZONE_OFFSET).unwrap(),
            None
        );
    }

    #[test]
    fn set_get_unset_roundtrip() {
        let settings = settings();
        let guild = GuildId::new(1);

        settings.set(guild, keys::TIMEZONE_OFFSET, &5.5).unwrap();
        assert_eq!(
            settings.get_or(guild, keys::TIMEZONE_OFFSET, 0.0).unwrap(),
            5.5
        );

        settings.unset(guild, keys::TIMEZONE_OFFSET).unwrap();
        assert_eq!(
            settings.get::<f64>(guild, keys::TIMEZONE_OFFSET).unwrap(),
            None
        );
    }

    #[test]
    fn settings_are_per_guild() {
        let settings = settings();

        settings.set(GuildId::new(1), keys::XP_PER_LEVEL, &250i64).unwrap();

        assert_eq!(
            settings
                .get_or(GuildId::new(2), keys::XP_PER_LEVEL, 500i64)
                .unwrap(),
            500
        );
    }

    #[test]
    fn incompatible_shape_falls_back() {
        let settings = settings();
        let guild = GuildId::new(1);

        settings
            .set(guild, keys::VC_NAME_TEMPLATE, &String::from("{name}"))
            .unwrap();

        // A string does not decode as (i64, i64), so the default wins.
        assert_eq!(
            settings
                .get_or(guild, keys::VC_NAME_TEMPLATE, (1i64, 2i64))
                .unwrap(),
            (1, 2)
        );
    }
}
