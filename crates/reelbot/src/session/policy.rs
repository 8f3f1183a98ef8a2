//! Per-chat concurrency gate
//!
//! Decides what happens when a chat sends a new link while an earlier one is
//! still being processed, according to [`PerChatPolicy`].

use std::sync::Arc;

use dashmap::DashMap;
use reelcore::PerChatPolicy;
use teloxide::types::ChatId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Admission ticket handed to a session.
#[derive(Debug)]
pub enum GateTicket {
    /// No limit on this chat
    Unrestricted,
    /// Exclusive slot already taken
    Held(OwnedMutexGuard<()>),
    /// Must wait for the chat's slot before starting
    Queued(Arc<Mutex<()>>),
}

/// One slot per chat, shared by all sessions of that chat.
#[derive(Debug, Clone)]
pub struct ChatGate {
    policy: PerChatPolicy,
    slots: Arc<DashMap<ChatId, Arc<Mutex<()>>>>,
}

impl ChatGate {
    pub fn new(policy: PerChatPolicy) -> Self {
        Self {
            policy,
            slots: Arc::new(DashMap::new()),
        }
    }

    fn slot(&self, chat_id: ChatId) -> Arc<Mutex<()>> {
        Arc::clone(self.slots.entry(chat_id).or_default().value())
    }

    /// Admits a new request from `chat_id`.
    ///
    /// Returns `None` when the policy is `reject` and the chat is busy.
    pub fn admit(&self, chat_id: ChatId) -> Option<GateTicket> {
        match self.policy {
            PerChatPolicy::Allow => Some(GateTicket::Unrestricted),
            PerChatPolicy::Reject => self.slot(chat_id).try_lock_owned().ok().map(GateTicket::Held),
            PerChatPolicy::Serialize => Some(GateTicket::Queued(self.slot(chat_id))),
        }
    }

    /// Forgets slots no session holds or waits for.
    pub fn release_idle(&self) {
        self.slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    /// Number of chats with a live slot
    pub fn tracked_chats(&self) -> usize {
        self.slots.len()
    }
}
