//! Presence channel membership.
//!
//! A presence channel tracks which users are currently subscribed. The
//! roster is seeded from the snapshot delivered with the subscription
//! acknowledgment and then maintained incrementally from member
//! added/removed frames. It is cleared on disconnect and rebuilt from
//! scratch when the channel is re-subscribed.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use ripple_protocol::{MemberAdded, PresenceSnapshot};

/// A presence channel member.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// The member's user id.
    pub id: String,
    /// The member's info payload, as supplied by the authorizer.
    pub info: Option<Value>,
}

/// Membership roster for one presence channel.
#[derive(Debug, Default)]
pub struct MemberRoster {
    members: Mutex<HashMap<String, Option<Value>>>,
}

impl MemberRoster {
    /// Create an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the roster with an initial membership snapshot.
    pub fn apply_snapshot(&self, snapshot: &PresenceSnapshot) {
        let mut members = self.lock();
        members.clear();
        for id in &snapshot.presence.ids {
            let info = snapshot.presence.hash.get(id).cloned();
            members.insert(id.clone(), info);
        }
    }

    /// Add a member. Returns the member, and whether it was new.
    pub fn add(&self, added: &MemberAdded) -> (Member, bool) {
        let mut members = self.lock();
        let was_new = !members.contains_key(&added.user_id);
        members.insert(added.user_id.clone(), added.user_info.clone());
        (
            Member {
                id: added.user_id.clone(),
                info: added.user_info.clone(),
            },
            was_new,
        )
    }

    /// Remove a member by user id, returning it if present.
    pub fn remove(&self, user_id: &str) -> Option<Member> {
        self.lock().remove(user_id).map(|info| Member {
            id: user_id.to_string(),
            info,
        })
    }

    /// Look up a member by user id.
    #[must_use]
    pub fn member(&self, user_id: &str) -> Option<Member> {
        self.lock().get(user_id).map(|info| Member {
            id: user_id.to_string(),
            info: info.clone(),
        })
    }

    /// Current members, in no particular order.
    #[must_use]
    pub fn members(&self) -> Vec<Member> {
        self.lock()
            .iter()
            .map(|(id, info)| Member {
                id: id.clone(),
                info: info.clone(),
            })
            .collect()
    }

    /// Current member count.
    #[must_use]
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Clear the roster (on disconnect or unsubscribe).
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<Value>>> {
        self.members.lock().expect("presence roster lock poisoned")
    }
}
