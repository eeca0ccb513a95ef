//! Session-keyed upload-batch state
//!
//! A batch groups the files of one model (mesh, then material, then texture)
//! under a single timestamp directory. Each client session holds at most one
//! active batch: the first file of a batch mints the timestamp, later files
//! reuse it, and the image file that ends the batch clears the slot. Slots
//! that were never completed expire after a TTL so an abandoned upload does
//! not glue unrelated files together later.

use chrono::{DateTime, Duration, Local};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct ActiveBatch {
    timestamp: String,
    started: DateTime<Local>,
}

/// Map of session id to its optional in-progress batch
#[derive(Debug)]
pub struct BatchSessions {
    slots: HashMap<String, ActiveBatch>,
    ttl: Duration,
}

impl BatchSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: HashMap::new(),
            ttl,
        }
    }

    /// Timestamp for the session's current batch, minting a new one when no
    /// live batch exists
    pub fn claim(&mut self, session: &str, now: DateTime<Local>) -> String {
        self.expire(now);
        if let Some(active) = self.slots.get(session) {
            return active.timestamp.clone();
        }
        let timestamp = crate::naming::batch_timestamp(now);
        log::debug!("session {} starts batch {}", session, timestamp);
        self.slots.insert(
            session.to_string(),
            ActiveBatch {
                timestamp: timestamp.clone(),
                started: now,
            },
        );
        timestamp
    }

    /// Terminal file of the batch was saved; the next upload starts fresh
    pub fn complete(&mut self, session: &str) {
        if let Some(active) = self.slots.remove(session) {
            log::debug!("session {} completed batch {}", session, active.timestamp);
        }
    }

    /// Drop batches older than the TTL
    pub fn expire(&mut self, now: DateTime<Local>) {
        let ttl = self.ttl;
        self.slots.retain(|session, active| {
            let live = now - active.started <= ttl;
            if !live {
                log::info!("session {} batch {} expired", session, active.timestamp);
            }
            live
        });
    }

    /// Active batch timestamp for a session, if any
    pub fn active(&self, session: &str) -> Option<&str> {
        self.slots.get(session).map(|a| a.timestamp.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 8, 25, 12, 0, s).unwrap()
    }

    #[test]
    fn test_claim_reuses_active_batch() {
        let mut sessions = BatchSessions::new(Duration::minutes(30));
        let first = sessions.claim("alice", at(0));
        let second = sessions.claim("alice", at(5));
        assert_eq!(first, second);
        assert_eq!(sessions.active("alice"), Some(first.as_str()));
    }

    #[test]
    fn test_complete_starts_new_batch() {
        let mut sessions = BatchSessions::new(Duration::minutes(30));
        let first = sessions.claim("alice", at(0));
        sessions.complete("alice");
        assert_eq!(sessions.active("alice"), None);
        let second = sessions.claim("alice", at(10));
        assert_ne!(first, second);
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut sessions = BatchSessions::new(Duration::minutes(30));
        let a = sessions.claim("alice", at(0));
        let b = sessions.claim("bob", at(1));
        assert_ne!(a, b);
        sessions.complete("alice");
        assert_eq!(sessions.active("bob"), Some(b.as_str()));
    }

    #[test]
    fn test_expiry_clears_stale_slot() {
        let mut sessions = BatchSessions::new(Duration::seconds(10));
        let first = sessions.claim("alice", at(0));
        // within ttl: same batch
        assert_eq!(sessions.claim("alice", at(10)), first);
        // past ttl: new batch minted
        let late = Local.with_ymd_and_hms(2025, 8, 25, 12, 5, 0).unwrap();
        let second = sessions.claim("alice", late);
        assert_ne!(first, second);
    }
}
