//! Temporary voice channel registry: which channels spawn rooms, which
//! channels are live rooms, who owns them and who is inside. Occupancy is
//! maintained purely from gateway voice-state transitions, so the
//! membership/ownership step is a pure function on the room document.

use crate::{ReadWriteTree, TanagerDb};
use color_eyre::eyre::Result;
use poise::serenity_prelude::{ChannelId, GuildId, UserId};
use serde::{Deserialize, Serialize};
use sled::Tree;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcRoom {
    pub guild_id: u64,
    pub owner: u64,
    /// Join order, oldest first. The owner is always present.
    pub members: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Members remain and the owner stayed.
    Stay,
    /// The owner left; the longest-present remaining member takes over.
    Promote(UserId),
    /// The room emptied out and should be deleted.
    Delete,
}

impl VcRoom {
    pub fn create(guild_id: GuildId, owner: UserId) -> Self {
        Self {
            guild_id: guild_id.get(),
            owner: owner.get(),
            members: vec![owner.get()],
        }
    }

    pub fn join(&mut self, user_id: UserId) {
        if !self.members.contains(&user_id.get()) {
            self.members.push(user_id.get());
        }
    }

    pub fn leave(&mut self, user_id: UserId) -> LeaveOutcome {
        self.members.retain(|member| *member != user_id.get());

        if self.members.is_empty() {
            return LeaveOutcome::Delete;
        }

        if self.owner == user_id.get() {
            self.owner = self.members[0];
            return LeaveOutcome::Promote(UserId::new(self.owner));
        }

        LeaveOutcome::Stay
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner == user_id.get()
    }
}

pub struct VcDb {
    rooms: Tree,
    creators: Tree,
}

impl VcDb {
    pub fn new(db: &TanagerDb) -> Result<Self> {
        Ok(VcDb {
            rooms: db.open_tree("vc_rooms")?,
            creators: db.open_tree("vc_creators")?,
        })
    }

    pub fn add_creator(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        self.creators
            .typed_insert::<(u64, u64), ()>(&(guild_id.get(), channel_id.get()), &())
    }

    pub fn remove_creator(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<bool> {
        Ok(self
            .creators
            .remove(bincode::serialize(&(guild_id.get(), channel_id.get()))?)?
            .is_some())
    }

    pub fn is_creator(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<bool> {
        Ok(self
            .creators
            .contains_key(bincode::serialize(&(guild_id.get(), channel_id.get()))?)?)
    }

    pub fn room(&self, channel_id: ChannelId) -> Result<Option<VcRoom>> {
        self.rooms.typed_get::<u64, VcRoom>(&channel_id.get())
    }

    pub fn save_room(&self, channel_id: ChannelId, room: &VcRoom) -> Result<()> {
        self.rooms.typed_insert::<u64, VcRoom>(&channel_id.get(), room)
    }

    pub fn remove_room(&self, channel_id: ChannelId) -> Result<()> {
        self.rooms.remove(bincode::serialize(&channel_id.get())?)?;
        Ok(())
    }

    pub fn rooms_for_guild(&self, guild_id: GuildId) -> Vec<(ChannelId, VcRoom)> {
        // Room keys are bare channel ids, so filter rather than prefix-scan.
        self.rooms
            .iter()
            .filter_map(|entry| entry.ok())
            .filter_map(|(key, value)| {
                let channel_id = bincode::deserialize::<u64>(&key).ok()?;
                let room = bincode::deserialize::<VcRoom>(&value).ok()?;
                Some((ChannelId::new(channel_id), room))
            })
            .filter(|(_, room)| room.guild_id == guild_id.get())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn owner_leaving_promotes_longest_present() {
        let mut room = VcRoom::create(GuildId::new(1), UserId::new(10));
        room.join(UserId::new(11));
        room.join(UserId::new(12));

        assert_eq!(
            room.leave(UserId::new(10)),
            LeaveOutcome::Promote(UserId::new(11))
        );
        assert!(room.is_owner(UserId::new(11)));
        assert_eq!(room.members, vec![11, 12]);
    }

    #[test]
    fn non_owner_leaving_changes_nothing_but_membership() {
        let mut room = VcRoom::create(GuildId::new(1), UserId::new(10));
        room.join(UserId::new(11));

        assert_eq!(room.leave(UserId::new(11)), LeaveOutcome::Stay);
        assert!(room.is_owner(UserId::new(10)));
    }

    #[test]
    fn last_member_leaving_deletes() {
        let mut room = VcRoom::create(GuildId::new(1), UserId::new(10));

        assert_eq!(room.leave(UserId::new(10)), LeaveOutcome::Delete);
    }

    #[test]
    fn duplicate_joins_are_ignored() {
        let mut room = VcRoom::create(GuildId::new(1), UserId::new(10));
        room.join(UserId::new(10));
        room.join(UserId::new(11));
        room.join(UserId::new(11));

        assert_eq!(room.members, vec![10, 11]);
    }

    #[test]
    fn registry_roundtrip() {
        let db = TanagerDb::temporary().unwrap();
        let vc = VcDb::new(&db).unwrap();
        let guild = GuildId::new(1);
        let creator = ChannelId::new(100);
        let spawned = ChannelId::new(200);

        vc.add_creator(guild, creator).unwrap();
        assert!(vc.is_creator(guild, creator).unwrap());
        assert!(!vc.is_creator(guild, spawned).unwrap());

        let room = VcRoom::create(guild, UserId::new(10));
        vc.save_room(spawned, &room).unwrap();
        assert_eq!(vc.room(spawned).unwrap(), Some(room));
        assert_eq!(vc.rooms_for_guild(guild).len(), 1);
        assert!(vc.rooms_for_guild(GuildId::new(2)).is_empty());

        vc.remove_room(spawned).unwrap();
        assert_eq!(vc.room(spawned).unwrap(), None);

        assert!(vc.remove_creator(guild, creator).unwrap());
        assert!(!vc.remove_creator(guild, creator).unwrap());
    }
}
