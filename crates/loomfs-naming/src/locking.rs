//! Hierarchical path-range lock queue.
//!
//! All pending lock requests live in one global FIFO queue. A request is
//! admitted once no earlier request in the queue conflicts with it, so
//! admission order is exactly enqueue order among conflicting requests and
//! no request can starve: it only ever waits on strictly earlier entries.
//!
//! The queue is pure data; blocking and wakeup live in the namespace
//! monitor that owns it.

use loomfs_common::Path;

/// A lock request: the path and the requested mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockRequest {
    /// Path range being locked.
    pub path: Path,
    /// True for an exclusive (writer) lock.
    pub exclusive: bool,
}

impl LockRequest {
    /// Builds a shared (reader) request.
    pub fn shared(path: Path) -> Self {
        LockRequest {
            path,
            exclusive: false,
        }
    }

    /// Builds an exclusive (writer) request.
    pub fn exclusive(path: Path) -> Self {
        LockRequest {
            path,
            exclusive: true,
        }
    }
}

/// Decides whether `later` must wait for `earlier`.
///
/// A writer excludes everything on its path's whole chain: the path itself,
/// every ancestor, and every descendant. A reader only keeps out writers at
/// its path or above; writers strictly below a reader touch metadata the
/// reader is not inspecting and may proceed.
pub fn conflicts(earlier: &LockRequest, later: &LockRequest) -> bool {
    match (earlier.exclusive, later.exclusive) {
        // Readers never conflict with each other.
        (false, false) => false,
        // Earlier writer blocks a reader at or below the written path.
        (true, false) => later.path.starts_with(&earlier.path),
        // Later writer must wait for a reader at or below the write path.
        (false, true) => earlier.path.starts_with(&later.path),
        // Writers conflict on any nesting, either direction.
        (true, true) => {
            earlier.path.starts_with(&later.path) || later.path.starts_with(&earlier.path)
        }
    }
}

#[derive(Debug)]
struct QueuedLock {
    ticket: u64,
    request: LockRequest,
}

/// FIFO queue of pending and admitted lock requests.
///
/// Entries stay in the queue from enqueue until release (or abandonment on
/// a failed admission); an admitted holder is simply an entry that nothing
/// earlier conflicts with.
#[derive(Debug, Default)]
pub struct LockQueue {
    entries: Vec<QueuedLock>,
    next_ticket: u64,
}

impl LockQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request at the tail and returns its ticket.
    pub fn enqueue(&mut self, request: LockRequest) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.entries.push(QueuedLock { ticket, request });
        ticket
    }

    /// Removes the entry with the given ticket, releasing its queue slot
    /// without it ever having been admitted.
    pub fn abandon(&mut self, ticket: u64) {
        self.entries.retain(|entry| entry.ticket != ticket);
    }

    /// Returns true iff some entry earlier in the queue conflicts with the
    /// entry holding `ticket`. A ticket no longer in the queue is not
    /// blocked.
    pub fn blocked(&self, ticket: u64) -> bool {
        let Some(position) = self
            .entries
            .iter()
            .position(|entry| entry.ticket == ticket)
        else {
            return false;
        };
        let request = &self.entries[position].request;
        self.entries[..position]
            .iter()
            .any(|earlier| conflicts(&earlier.request, request))
    }

    /// Removes the first entry equal to `request` by value. Returns false
    /// if no such entry exists.
    pub fn release(&mut self, request: &LockRequest) -> bool {
        match self
            .entries
            .iter()
            .position(|entry| entry.request == *request)
        {
            Some(position) => {
                self.entries.remove(position);
                true
            }
            None => false,
        }
    }

    /// Number of queued requests, admitted holders included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true iff the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
