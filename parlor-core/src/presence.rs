use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{info, warn};
use parking_lot::Mutex;

use crate::{broker::Broker, ChatContext, RoomEvent, Storage};

/// Tracks which sessions are currently present in each room.
///
/// Presence is a set of registration entries with a TTL, not a counter.
/// A session that vanishes without saying goodbye simply stops
/// heartbeating, and its entry expires. The count can therefore never
/// drift below zero or leak upwards.
pub struct PresenceTracker {
    ttl: Duration,
    rooms: Mutex<HashMap<String, HashMap<String, Instant>>>,
}

impl PresenceTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a session in a room, returning the updated count.
    /// Joining twice refreshes the existing entry.
    pub fn join(&self, topic: &str, session_key: &str) -> usize {
        let mut rooms = self.rooms.lock();
        let room = rooms.entry(topic.to_string()).or_default();

        room.insert(session_key.to_string(), Instant::now());

        Self::alive(room, self.ttl)
    }

    /// Refreshes a session's entry so it doesn't expire.
    /// A heartbeat for an unregistered session is ignored, it may have
    /// been swept while the session was reconnecting.
    pub fn heartbeat(&self, topic: &str, session_key: &str) {
        let mut rooms = self.rooms.lock();

        if let Some(entry) = rooms
            .get_mut(topic)
            .and_then(|room| room.get_mut(session_key))
        {
            *entry = Instant::now();
        }
    }

    /// Deregisters a session, returning the updated count.
    /// Leaving twice, or leaving without having joined, changes nothing.
    pub fn leave(&self, topic: &str, session_key: &str) -> usize {
        let mut rooms = self.rooms.lock();

        let Some(room) = rooms.get_mut(topic) else {
            return 0;
        };

        room.remove(session_key);
        let count = Self::alive(room, self.ttl);

        if room.is_empty() {
            rooms.remove(topic);
        }

        count
    }

    pub fn current_count(&self, topic: &str) -> usize {
        let rooms = self.rooms.lock();

        rooms
            .get(topic)
            .map(|room| Self::alive(room, self.ttl))
            .unwrap_or(0)
    }

    /// Drops expired entries, returning the rooms whose count changed
    /// along with their corrected counts.
    pub fn sweep(&self) -> Vec<(String, usize)> {
        let mut rooms = self.rooms.lock();
        let mut changed = vec![];

        rooms.retain(|topic, room| {
            let before = room.len();
            room.retain(|_, last_seen| last_seen.elapsed() < self.ttl);

            if room.len() != before {
                changed.push((topic.clone(), room.len()));
            }

            !room.is_empty()
        });

        changed
    }

    fn alive(room: &HashMap<String, Instant>, ttl: Duration) -> usize {
        room.values().filter(|seen| seen.elapsed() < ttl).count()
    }
}

/// Periodically expires stale presence entries and broadcasts the
/// corrected counts, so rooms recover from ungraceful disconnects.
pub async fn run_presence_sweeper<S, B>(context: ChatContext<S, B>)
where
    S: Storage,
    B: Broker,
{
    let mut interval = tokio::time::interval(context.config.presence_sweep_interval);

    loop {
        interval.tick().await;

        for (topic, count) in context.presence.sweep() {
            info!("Expired stale presence in room {}, now {}", topic, count);

            let event = RoomEvent::Presence { count };

            if let Err(e) = context.broker.publish(&topic, event).await {
                warn!("Failed to broadcast corrected count for {}: {}", topic, e);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_count_follows_joins_and_leaves() {
        let tracker = PresenceTracker::new(Duration::from_secs(30));

        assert_eq!(tracker.join("lobby", "a"), 1);
        assert_eq!(tracker.join("lobby", "b"), 2);
        assert_eq!(tracker.current_count("lobby"), 2);

        assert_eq!(tracker.leave("lobby", "a"), 1);
        assert_eq!(tracker.current_count("lobby"), 1);
        assert_eq!(tracker.current_count("elsewhere"), 0);
    }

    #[test]
    fn test_leave_is_idempotent_and_never_negative() {
        let tracker = PresenceTracker::new(Duration::from_secs(30));

        tracker.join("lobby", "a");
        assert_eq!(tracker.leave("lobby", "a"), 0);
        assert_eq!(tracker.leave("lobby", "a"), 0);
        assert_eq!(tracker.leave("lobby", "never-joined"), 0);
        assert_eq!(tracker.current_count("lobby"), 0);
    }

    #[test]
    fn test_rejoining_does_not_double_count() {
        let tracker = PresenceTracker::new(Duration::from_secs(30));

        tracker.join("lobby", "a");
        assert_eq!(tracker.join("lobby", "a"), 1);
    }

    #[test]
    fn test_stale_entries_expire() {
        let tracker = PresenceTracker::new(Duration::from_millis(20));

        tracker.join("lobby", "quiet");
        tracker.join("lobby", "chatty");

        std::thread::sleep(Duration::from_millis(15));
        tracker.heartbeat("lobby", "chatty");
        std::thread::sleep(Duration::from_millis(10));

        // "quiet" went silent past the TTL, "chatty" kept heartbeating
        assert_eq!(tracker.current_count("lobby"), 1);

        let changed = tracker.sweep();
        assert_eq!(changed, vec![("lobby".to_string(), 1)]);

        // A second sweep has nothing left to correct
        assert!(tracker.sweep().is_empty());
    }
}
