use tracing::debug;

use super::GuildQueue;
use crate::{
    common::types::{ChannelId, VoiceStateSnapshot, is_voice_empty},
    events::QueueEvent,
    player::Player,
};

fn channel_is_empty(player: &Player, channel: ChannelId) -> bool {
    is_voice_empty(&player.inner.voice.adapter().channel_members(channel))
}

fn empty_timer(queue: &GuildQueue) -> String {
    format!("empty_{}", queue.guild_id())
}

/// Built-in reaction to a voice state change in the queue's guild.
pub(crate) fn handle_voice_state(
    player: &Player,
    queue: &GuildQueue,
    old: &VoiceStateSnapshot,
    new: &VoiceStateSnapshot,
) {
    let Some(channel) = queue.channel() else {
        return;
    };
    if queue.dispatcher().is_none() {
        return;
    }
    let me = player.inner.voice.adapter().me();
    let is_me = new.user_id == me;

    if is_me && old.channel_id.is_some() && new.channel_id.is_none() {
        debug!("[{}] Removed from voice channel {}", queue.guild_id(), channel.id);
        let _ = queue.delete();
        return;
    }

    if is_me {
        if new.server_mute.is_some() && new.server_mute != old.server_mute {
            queue.node().set_paused(new.server_mute.unwrap_or(false));
        } else if new.suppress.is_some() && new.suppress != old.suppress {
            queue.node().set_paused(new.suppress.unwrap_or(false));
        }
    }

    let options = queue.options();
    if options.pause_on_empty {
        let empty = channel_is_empty(player, channel.id);
        let flag = &queue.inner.empty_paused;
        if empty {
            if !flag.swap(true, std::sync::atomic::Ordering::AcqRel) {
                queue.node().set_paused(true);
                queue.emit(QueueEvent::Debug("Paused because the voice channel is empty".into()));
            }
        } else if flag.swap(false, std::sync::atomic::Ordering::AcqRel) {
            queue.node().set_paused(false);
            queue.emit(QueueEvent::Debug("Resumed because the voice channel is populated again".into()));
        }
    }

    let moved = is_me && old.channel_id.is_some() && new.channel_id.is_some() && old.channel_id != new.channel_id;
    let left_ours = !moved && old.channel_id == Some(channel.id) && new.channel_id != old.channel_id;
    let joined_ours = !moved && new.channel_id == Some(channel.id) && old.channel_id != new.channel_id;

    if moved {
        let Some(target) = new.channel_id else {
            return;
        };
        debug!("[{}] Moved from {} to {}", queue.guild_id(), channel.id, target);
        let mut moved_to = channel.clone();
        moved_to.id = target;
        *queue.inner.channel.write() = Some(moved_to);
        populate_or_count_down(player, queue, target);
    } else if left_ours {
        if channel_is_empty(player, channel.id) {
            start_empty_countdown(queue, channel.id);
        }
    } else if joined_ours {
        populate_or_count_down(player, queue, channel.id);
    }
}

fn populate_or_count_down(player: &Player, queue: &GuildQueue, channel: ChannelId) {
    if !channel_is_empty(player, channel) {
        if queue.cancel_timer(&empty_timer(queue)) {
            queue.emit(QueueEvent::ChannelPopulate);
        }
    } else {
        start_empty_countdown(queue, channel);
    }
}

fn start_empty_countdown(queue: &GuildQueue, channel: ChannelId) {
    let cooldown = queue.options().leave_on_empty_cooldown;
    queue.schedule(empty_timer(queue), cooldown, move |queue| async move {
        let Some(player) = queue.player() else {
            return;
        };
        if !channel_is_empty(&player, channel) || !player.nodes().has(queue.guild_id()) {
            return;
        }
        queue.emit(QueueEvent::EmptyChannel);
        if queue.options().leave_on_empty {
            let _ = queue.delete();
        }
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        common::types::{GuildId, UserId, VoiceMember},
        events::EventKind,
        queue::{GuildQueueOptions, PlayOptions},
        testkit::{EventRecorder, MemoryExtractor, TestPlayer},
        voice::VoiceAdapter,
    };

    const GUILD: GuildId = GuildId(5);
    const CHANNEL: ChannelId = ChannelId(10);

    fn state(user: u64, channel: Option<u64>) -> VoiceStateSnapshot {
        VoiceStateSnapshot {
            guild_id: GUILD,
            user_id: UserId(user),
            channel_id: channel.map(ChannelId),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_channel_deletes_after_cooldown() {
        let env = TestPlayer::new().await;
        let recorder = EventRecorder::attach(&env.player);
        let queue = env.player.nodes().create(
            GUILD,
            GuildQueueOptions {
                leave_on_empty_cooldown: Duration::from_secs(5),
                ..Default::default()
            },
        );
        queue.connect(CHANNEL).await.unwrap();

        env.adapter.set_members(CHANNEL, vec![]);
        env.player.handle_voice_state_update(&state(42, Some(10)), &state(42, None));
        assert!(queue.has_timer("empty_5"));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(recorder.count(EventKind::EmptyChannel), 1);
        assert!(queue.is_deleted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_member_switching_channels_starts_countdown() {
        let env = TestPlayer::new().await;
        let recorder = EventRecorder::attach(&env.player);
        let queue = env.player.nodes().create(
            GUILD,
            GuildQueueOptions {
                leave_on_empty_cooldown: Duration::from_secs(5),
                ..Default::default()
            },
        );
        queue.connect(CHANNEL).await.unwrap();

        env.adapter.set_members(CHANNEL, vec![]);
        env.player.handle_voice_state_update(&state(42, Some(10)), &state(42, Some(11)));
        assert!(queue.has_timer("empty_5"));
        assert_eq!(queue.channel().map(|c| c.id), Some(CHANNEL));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(recorder.count(EventKind::EmptyChannel), 1);
        assert!(queue.is_deleted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repopulating_cancels_countdown() {
        let env = TestPlayer::new().await;
        let recorder = EventRecorder::attach(&env.player);
        let queue = env.player.nodes().create(
            GUILD,
            GuildQueueOptions {
                leave_on_empty_cooldown: Duration::from_secs(5),
                ..Default::default()
            },
        );
        queue.connect(CHANNEL).await.unwrap();

        env.adapter.set_members(CHANNEL, vec![]);
        env.player.handle_voice_state_update(&state(42, Some(10)), &state(42, None));
        tokio::time::sleep(Duration::from_secs(1)).await;

        env.adapter.set_members(CHANNEL, vec![VoiceMember { id: UserId(42), bot: false }]);
        env.player.handle_voice_state_update(&state(42, None), &state(42, Some(10)));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(recorder.count(EventKind::ChannelPopulate), 1);
        assert_eq!(recorder.count(EventKind::EmptyChannel), 0);
        assert!(!queue.is_deleted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_on_empty_resumes_on_populate() {
        let env = TestPlayer::with_extractor(MemoryExtractor::new("mem", &["long"]).with_frames(1000).shared()).await;
        let queue = env.player.nodes().create(
            GUILD,
            GuildQueueOptions {
                leave_on_empty: false,
                ..Default::default()
            },
        );
        queue.connect(CHANNEL).await.unwrap();
        queue.add_track(env.search("long").await).unwrap();
        queue.node().play(None, PlayOptions::immediate()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        env.adapter.set_members(CHANNEL, vec![]);
        env.player.handle_voice_state_update(&state(42, Some(10)), &state(42, None));
        assert!(queue.node().is_paused());

        env.adapter.set_members(CHANNEL, vec![VoiceMember { id: UserId(42), bot: false }]);
        env.player.handle_voice_state_update(&state(42, None), &state(42, Some(10)));
        assert!(!queue.node().is_paused());
        queue.delete().unwrap();
    }

    #[tokio::test]
    async fn test_bot_removed_deletes_queue() {
        let env = TestPlayer::new().await;
        let queue = env.player.nodes().create(GUILD, GuildQueueOptions::default());
        queue.connect(CHANNEL).await.unwrap();

        let me = env.adapter.me().0;
        env.player.handle_voice_state_update(&state(me, Some(10)), &state(me, None));
        assert!(queue.is_deleted());
        assert!(!env.player.nodes().has(GUILD));
    }

    #[tokio::test]
    async fn test_bot_move_updates_channel() {
        let env = TestPlayer::new().await;
        env.adapter.set_members(ChannelId(11), vec![VoiceMember { id: UserId(42), bot: false }]);
        env.adapter.set_members(CHANNEL, vec![VoiceMember { id: UserId(42), bot: false }]);
        let queue = env.player.nodes().create(GUILD, GuildQueueOptions::default());
        queue.connect(CHANNEL).await.unwrap();

        let me = env.adapter.me().0;
        env.player.handle_voice_state_update(&state(me, Some(10)), &state(me, Some(11)));
        assert_eq!(queue.channel().unwrap().id, ChannelId(11));
        assert!(!queue.is_deleted());
    }
}
