use std::sync::Weak;

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::debug;

use super::PlayerInner;
use crate::{
    common::{
        errors::{PlayerError, PlayerResult},
        types::GuildId,
    },
    events::QueueEvent,
    queue::{GuildQueue, GuildQueueOptions},
};

impl From<&GuildQueue> for GuildId {
    fn from(queue: &GuildQueue) -> Self {
        queue.guild_id()
    }
}

/// One queue per guild.
pub struct GuildNodeManager {
    player: Weak<PlayerInner>,
    cache: DashMap<GuildId, GuildQueue>,
}

impl GuildNodeManager {
    pub(crate) fn new(player: Weak<PlayerInner>) -> Self {
        Self {
            player,
            cache: DashMap::new(),
        }
    }

    /// Returns the guild's queue, creating it with `options` when there is
    /// none. Options are ignored for an existing queue.
    pub fn create(&self, guild: impl Into<GuildId>, options: GuildQueueOptions) -> GuildQueue {
        let guild = guild.into();
        let (queue, created) = match self.cache.entry(guild) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let queue = GuildQueue::new(self.player.clone(), guild, options);
                entry.insert(queue.clone());
                (queue, true)
            }
        };
        if created {
            debug!("[{}] Created queue {}", guild, queue.id());
            queue.emit(QueueEvent::QueueCreate);
        }
        queue
    }

    pub fn get(&self, guild: impl Into<GuildId>) -> Option<GuildQueue> {
        self.cache.get(&guild.into()).map(|q| q.clone())
    }

    pub fn has(&self, guild: impl Into<GuildId>) -> bool {
        self.cache.contains_key(&guild.into())
    }

    /// Same as [`get`](Self::get); accepts a queue as well as an id.
    pub fn resolve(&self, node: impl Into<GuildId>) -> Option<GuildQueue> {
        self.get(node)
    }

    pub fn resolve_id(&self, node: impl Into<GuildId>) -> Option<GuildId> {
        let guild = node.into();
        self.has(guild).then_some(guild)
    }

    /// Deletes the guild's queue.
    pub fn delete(&self, guild: impl Into<GuildId>) -> PlayerResult<()> {
        let guild = guild.into();
        let queue = self.get(guild).ok_or(PlayerError::NoGuildQueue(guild))?;
        queue.delete()
    }

    /// Unregisters `queue` if it is still the guild's registered queue.
    pub(crate) fn remove(&self, queue: &GuildQueue) {
        self.cache
            .remove_if(&queue.guild_id(), |_, cached| cached == queue);
    }

    /// Registers a revived queue again. Fails when the guild already got a
    /// different queue in the meantime.
    pub(crate) fn restore(&self, queue: &GuildQueue) -> PlayerResult<()> {
        match self.cache.entry(queue.guild_id()) {
            Entry::Occupied(entry) if entry.get() != queue => Err(PlayerError::invalid_arg(
                "queue",
                format!("no other queue registered for guild {}", queue.guild_id()),
                format!("queue {}", entry.get().id()),
            )),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                entry.insert(queue.clone());
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn all(&self) -> Vec<GuildQueue> {
        self.cache.iter().map(|q| q.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{events::EventKind, testkit::{EventRecorder, TestPlayer}};

    #[tokio::test]
    async fn test_one_queue_per_guild() {
        let env = TestPlayer::new().await;
        let recorder = EventRecorder::attach(&env.player);
        let nodes = env.player.nodes();

        let a = nodes.create(GuildId(1), GuildQueueOptions::default());
        let b = nodes.create(
            GuildId(1),
            GuildQueueOptions {
                max_size: Some(1),
                ..Default::default()
            },
        );
        assert_eq!(a, b);
        assert_eq!(b.max_size(), None);
        assert_eq!(nodes.len(), 1);
        assert_eq!(recorder.count(EventKind::QueueCreate), 1);

        assert_eq!(nodes.resolve(&a), Some(a.clone()));
        assert_eq!(nodes.resolve_id(&a), Some(GuildId(1)));
    }

    #[tokio::test]
    async fn test_delete_unregisters_and_allows_new_queue() {
        let env = TestPlayer::new().await;
        let nodes = env.player.nodes();
        let old = nodes.create(GuildId(1), GuildQueueOptions::default());

        nodes.delete(GuildId(1)).unwrap();
        assert!(!nodes.has(GuildId(1)));
        assert_eq!(nodes.delete(GuildId(1)), Err(PlayerError::NoGuildQueue(GuildId(1))));

        let fresh = nodes.create(GuildId(1), GuildQueueOptions::default());
        assert_ne!(old, fresh);
        assert!(matches!(old.revive(), Err(PlayerError::InvalidArgType { .. })));
        assert!(old.is_deleted());
        assert_eq!(nodes.get(GuildId(1)), Some(fresh));
    }
}
