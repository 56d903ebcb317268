pub mod leveling;
pub mod responses;
pub mod settings;
pub mod streaks;
pub mod voice;
pub mod warnings;

use std::fmt::Debug;
use std::path::Path;

use bot_traits::TraceErr;
use color_eyre::eyre::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};
use sled::{Db, Tree};

pub trait ReadWriteTree {
    fn typed_insert<K: Serialize, V: DeserializeOwned + Serialize>(
        &self,
        key: &K,
        value: &V,
    ) -> Result<()>;

    fn typed_get<K: Serialize, V: DeserializeOwned + Serialize>(
        &self,
        key: &K,
    ) -> Result<Option<V>>;

    fn typed_get_or_default<K: Serialize, V: DeserializeOwned + Serialize + Default>(
        &self,
        key: &K,
    ) -> Result<V>;

    fn typed_remove<K: Serialize, V: DeserializeOwned + Serialize>(
        &self,
        key: &K,
    ) -> Result<Option<V>>;

    fn typed_merge<K: Serialize, V: DeserializeOwned + Serialize>(
        &self,
        key: &K,
        value: &V,
    ) -> Result<Option<V>>;
}

impl ReadWriteTree for Tree {
    fn typed_insert<K: Serialize, V: DeserializeOwned + Serialize>(
        &self,
        key: &K,
        value: &V,
    ) -> Result<()> {
        let key = bincode::serialize::<K>(key)?;
        let value = bincode::serialize::<V>(value)?;
        self.insert(key, value)?;
        Ok(())
    }

    fn typed_get<K: Serialize, V: DeserializeOwned + Serialize>(
        &self,
        key: &K,
    ) -> Result<Option<V>> {
        Ok(self
            .get(bincode::serialize::<K>(key)?)?
            .map(|value| bincode::deserialize::<V>(&value))
            .transpose()?)
    }

    fn typed_get_or_default<K: Serialize, V: DeserializeOwned + Serialize + Default>(
        &self,
        key: &K,
    ) -> Result<V> {
        Ok(self.typed_get::<K, V>(key)?.unwrap_or_default())
    }

    fn typed_remove<K: Serialize, V: DeserializeOwned + Serialize>(
        &self,
        key: &K,
    ) -> Result<Option<V>> {
        Ok(self
            .remove(bincode::serialize::<K>(key)?)?
            .map(|value| bincode::deserialize::<V>(&value))
            .transpose()?)
    }

    fn typed_merge<K: Serialize, V: DeserializeOwned + Serialize>(
        &self,
        key: &K,
        value: &V,
    ) -> Result<Option<V>> {
        Ok(self
            .merge(
                bincode::serialize::<K>(key)?,
                bincode::serialize::<V>(value)?,
            )?
            .map(|value| bincode::deserialize::<V>(&value))
            .transpose()?)
    }
}

/// One sled database holding every per-guild collection as its own tree.
#[derive(Debug)]
pub struct TanagerDb(Db);

impl TanagerDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self(sled::open(path)?))
    }

    /// In-memory database, dropped on close. Used by tests.
    pub fn temporary() -> Result<Self> {
        Ok(Self(sled::Config::new().temporary(true).open()?))
    }

    pub fn generate_id(&self) -> Result<u64> {
        self.0.generate_id().wrap_err("Failed to generate id")
    }

    fn open_tree(&self, name: impl AsRef<[u8]>) -> Result<Tree> {
        self.0.open_tree(name).wrap_err("Failed to open tree")
    }

    fn create_update_with_deserialization<V: DeserializeOwned + Serialize + Debug>(
        old_value: Option<&[u8]>,
        update_function: impl FnMut(V) -> V,
        mut get_default_value: impl FnMut() -> V,
    ) -> Option<Vec<u8>> {
        old_value
            .map_or_else(
                || Ok(get_default_value()),
                |v| bincode::deserialize::<V>(v).wrap_err("Failed to deserialize"),
            )
            .trace_err_ok()
            .map(update_function)
            .map(|new_value| bincode::serialize::<V>(&new_value).wrap_err("Failed to serialize"))
            .transpose()
            .trace_err_ok()
            .flatten()
            .or_else(|| old_value.map(|v| v.to_vec()))
    }
}

/// Serialized guild id, usable as a `scan_prefix` argument for any tree
/// whose keys are bincode `(guild, ...)` tuples. Works because bincode's
/// fixint encoding makes the leading u64 a fixed 8-byte prefix.
fn guild_key_prefix(guild_id: u64) -> Vec<u8> {
    bincode::serialize(&guild_id).unwrap_or_default()
}
