//! Deferred command buffer.
//!
//! Commands that are meaningful to issue once the device comes back
//! (power, source and sound-mode selection) are enqueued here while the
//! device is unreachable and replayed in submission order by the reconnect
//! loop. Entries older than the TTL at drain time are dropped unexecuted.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// A command that can be deferred until connectivity returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeferredCommand {
    PowerOn,
    PowerOff,
    /// Select the input with this display title.
    SelectSource(String),
    /// Select the sound mode with this display title.
    SelectSoundMode(String),
}

#[derive(Debug)]
struct BufferedEntry {
    submitted: Instant,
    command: DeferredCommand,
}

/// FIFO of deferred commands with an age limit.
#[derive(Debug)]
pub(crate) struct CommandBuffer {
    entries: VecDeque<BufferedEntry>,
    ttl: Duration,
}

impl CommandBuffer {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            ttl,
        }
    }

    /// Enqueues a command, stamped with the current time.
    pub(crate) fn push(&mut self, command: DeferredCommand) {
        self.entries.push_back(BufferedEntry {
            submitted: Instant::now(),
            command,
        });
    }

    /// Pops the oldest non-expired command, dropping expired entries on the
    /// way. Returns `None` once the buffer is drained.
    pub(crate) fn pop_fresh(&mut self) -> Option<DeferredCommand> {
        while let Some(entry) = self.entries.pop_front() {
            let age = entry.submitted.elapsed();
            if age > self.ttl {
                log::debug!(
                    "dropping buffered command {:?} (aged {:?}, limit {:?})",
                    entry.command,
                    age,
                    self.ttl
                );
                continue;
            }
            return Some(entry.command);
        }
        None
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
