use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = Arc<StdMutex<HashMap<i64, Arc<Mutex<()>>>>>;

/// Per-conversation async locks.
///
/// Sends, read receipts and closes on one conversation run one at a time so
/// that subscribers see messages in id order and unread counters never
/// interleave with a reset. Different conversations never contend.
#[derive(Clone, Default)]
pub struct ConversationLocks {
    table: LockTable,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, conversation_id: i64) -> ConversationGuard {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            table
                .entry(conversation_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let guard = lock.lock_owned().await;

        ConversationGuard {
            conversation_id,
            table: self.table.clone(),
            guard: Some(guard),
        }
    }

    /// Number of conversations with a live lock entry.
    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held for the duration of a conversation critical section.
pub struct ConversationGuard {
    conversation_id: i64,
    table: LockTable,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ConversationGuard {
    pub fn conversation_id(&self) -> i64 {
        self.conversation_id
    }
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        self.guard.take();

        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        // Only the table itself still references the lock: nobody holds or awaits it
        let unused = table
            .get(&self.conversation_id)
            .map(|lock| Arc::strong_count(lock) == 1)
            .unwrap_or(false);
        if unused {
            table.remove(&self.conversation_id);
        }
    }
}
