// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot frame handoff between capture thread and consumer
//!
//! One slot, one writer, one reader. The producer overwrites any unread
//! value (latest-wins, bounded memory); the consumer polls without
//! blocking. This is the only data shared between the capture thread and
//! the consumer per stream.

use std::sync::Mutex;

/// Single-slot producer-overwrites, consumer-polls mailbox
#[derive(Debug)]
pub struct FrameExchange<T> {
    slot: Mutex<Option<T>>,
}

// Manual impl: a derive would demand `T: Default` for an empty slot.
impl<T> Default for FrameExchange<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameExchange<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Publish a value, replacing any unread one
    pub fn publish(&self, value: T) {
        *self.slot.lock().unwrap() = Some(value);
    }

    /// Take the latest unread value, if any. Never blocks on the producer.
    pub fn try_take(&self) -> Option<T> {
        self.slot.lock().unwrap().take()
    }

    /// Drop any unread value
    pub fn clear(&self) {
        *self.slot.lock().unwrap() = None;
    }
}
