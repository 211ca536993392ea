//! The shared message queue: the single mutex + condition variable this
//! process uses to hand messages from receiver threads to the one
//! application thread, and to wake it for termination events.
//!
//! Everything a blocked `recv` needs to re-check on every wakeup — the
//! queue itself, the pattern it's waiting for, whether that pattern has
//! been matched, each peer's left-block flag, and the world's group-failed
//! flag — lives behind *one* lock (spec §5: left-block and group-failed are
//! read "under the queue mutex alongside condition-variable waits"). This
//! is the same shape as `ch.rs`'s `chennel_only_channel` and
//! `worker.rs`'s ready-flag elsewhere in this pack, just with a few more
//! fields riding along in the guarded struct.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use crate::wire::{Rank, Tag};

/// A one-shot cell: empty until a receiver thread calls [`fulfill`], at
/// which point any caller blocked in [`take`] wakes up with the payload.
/// The consumer only touches this after unlinking the message from the
/// queue, so contention is limited to the one reader/writer pair spec §5
/// calls out.
#[derive(Debug)]
pub struct PayloadCell {
    inner: Mutex<Option<Vec<u8>>>,
    ready: Condvar,
}

impl PayloadCell {
    fn new() -> Self {
        PayloadCell { inner: Mutex::new(None), ready: Condvar::new() }
    }

    /// Called exactly once, by the receiver thread that owns this message,
    /// after it has read the full payload off the wire.
    pub fn fulfill(&self, payload: Vec<u8>) {
        let mut guard = self.inner.lock().unwrap();
        *guard = Some(payload);
        self.ready.notify_all();
    }

    /// Blocks until the payload is ready, then returns it. Called exactly
    /// once, by the `recv` caller that unlinked this message from the queue.
    pub fn take(&self) -> Vec<u8> {
        let mut guard = self.inner.lock().unwrap();
        while guard.is_none() {
            guard = self.ready.wait(guard).unwrap();
        }
        guard.take().expect("payload cell fulfilled exactly once")
    }
}

/// A message sitting in the queue: metadata is present immediately, the
/// payload arrives asynchronously via `payload`.
#[derive(Debug)]
pub struct QueuedMessage {
    pub source: Rank,
    pub tag: Tag,
    pub count: i32,
    pub payload: PayloadCell,
}

impl QueuedMessage {
    pub fn new(source: Rank, tag: Tag, count: i32) -> Arc<QueuedMessage> {
        Arc::new(QueuedMessage { source, tag, count, payload: PayloadCell::new() })
    }
}

/// A receive pattern: what a blocked `recv` call is waiting to match.
#[derive(Debug, Clone, Copy)]
pub struct Pattern {
    pub source: Rank,
    pub tag: Tag,
    pub count: i32,
}

/// `match(P, M)` from spec §4.2: tag 0 on the receive side is a wildcard for
/// any strictly positive send tag; negative (control) tags never match it.
pub fn matches(pattern: &Pattern, msg: &QueuedMessage) -> bool {
    pattern.source == msg.source
        && pattern.count == msg.count
        && (pattern.tag == msg.tag || (pattern.tag == 0 && msg.tag > 0))
}

struct QueueInner {
    messages: VecDeque<Arc<QueuedMessage>>,
    pending_pattern: Option<Pattern>,
    matched: bool,
    left_block: Vec<bool>,
    group_failed: bool,
}

/// The per-process shared queue and its termination-protocol flags, all
/// guarded by one mutex/condvar pair.
pub struct MessageQueue {
    inner: Mutex<QueueInner>,
    cv: Condvar,
}

impl MessageQueue {
    pub fn new(world_size: usize) -> Self {
        MessageQueue {
            inner: Mutex::new(QueueInner {
                messages: VecDeque::new(),
                pending_pattern: None,
                matched: true,
                left_block: vec![false; world_size],
                group_failed: false,
            }),
            cv: Condvar::new(),
        }
    }

    /// Appends a freshly-arrived message to the tail of the queue, and
    /// wakes a blocked `recv` if its pattern matches (spec §4.1 step 3).
    pub fn push(&self, msg: Arc<QueuedMessage>) {
        let mut g = self.inner.lock().unwrap();
        let is_match = g
            .pending_pattern
            .map(|p| !g.matched && matches(&p, &msg))
            .unwrap_or(false);
        g.messages.push_back(msg);
        if is_match {
            g.matched = true;
            self.cv.notify_all();
        }
    }

    /// Scans head-to-tail for the first message matching `pattern`,
    /// unlinking and returning it if found. Used for the immediate-hit path
    /// of `recv` (spec §4.4 step 2) and the rescan after a wakeup (step 5).
    fn take_matching_locked(g: &mut QueueInner, pattern: &Pattern) -> Option<Arc<QueuedMessage>> {
        let idx = g.messages.iter().position(|m| matches(pattern, m))?;
        g.messages.remove(idx)
    }

    pub fn take_matching(&self, pattern: &Pattern) -> Option<Arc<QueuedMessage>> {
        let mut g = self.inner.lock().unwrap();
        Self::take_matching_locked(&mut g, pattern)
    }

    /// Sets peer `p`'s left-block flag and wakes anyone waiting.
    pub fn set_left_block(&self, p: usize) {
        let mut g = self.inner.lock().unwrap();
        g.left_block[p] = true;
        self.cv.notify_all();
    }

    pub fn is_left_block(&self, p: usize) -> bool {
        self.inner.lock().unwrap().left_block[p]
    }

    /// Sets the world-wide group-failed flag (idempotent) and wakes anyone
    /// waiting. Returns `true` if this call was the one that set it.
    pub fn set_group_failed(&self) -> bool {
        let mut g = self.inner.lock().unwrap();
        if g.group_failed {
            return false;
        }
        g.group_failed = true;
        self.cv.notify_all();
        true
    }

    pub fn is_group_failed(&self) -> bool {
        self.inner.lock().unwrap().group_failed
    }

    /// Outcome of a blocking wait for `pattern` on behalf of `recv`.
    pub fn wait_for(&self, pattern: Pattern, wait_kind: WaitKind) -> WaitOutcome {
        let mut g = self.inner.lock().unwrap();

        if let Some(found) = Self::take_matching_locked(&mut g, &pattern) {
            return WaitOutcome::Found(found);
        }

        g.pending_pattern = Some(pattern);
        g.matched = false;

        loop {
            if g.matched {
                break;
            }
            match wait_kind {
                WaitKind::User { source } => {
                    if g.left_block[source] {
                        g.matched = true;
                        return WaitOutcome::RemoteFinished;
                    }
                }
                WaitKind::CollectivePhase { source } => {
                    if g.group_failed {
                        g.matched = true;
                        return WaitOutcome::GroupFailed;
                    }
                    if g.left_block[source] {
                        g.matched = true;
                        return WaitOutcome::LeftBlockDuringCollective;
                    }
                }
                WaitKind::Internal => {}
            }
            g = self.cv.wait(g).unwrap();
        }

        match Self::take_matching_locked(&mut g, &pattern) {
            Some(found) => WaitOutcome::Found(found),
            None => {
                // Woken as "matched" (e.g. a racing push already consumed
                // into the scan above) but nothing left to find: treat as
                // a spurious miss and let the caller retry the whole recv.
                WaitOutcome::Retry
            }
        }
    }
}

/// Which wakeup discipline a blocked `recv` should use (spec §4.4 step 4).
#[derive(Clone, Copy)]
pub enum WaitKind {
    /// A user recv (tag >= 0): also wakes on the source's left-block.
    User { source: usize },
    /// A `GROUP_BEGIN`/`GROUP_END` recv inside a collective: also wakes on
    /// group-failed.
    CollectivePhase { source: usize },
    /// Negative-tag internal coordination recv: waits only for a match.
    Internal,
}

pub enum WaitOutcome {
    Found(Arc<QueuedMessage>),
    RemoteFinished,
    GroupFailed,
    LeftBlockDuringCollective,
    Retry,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(source: Rank, tag: Tag, count: i32) -> Arc<QueuedMessage> {
        QueuedMessage::new(source, tag, count)
    }

    #[test]
    fn exact_tag_matches() {
        let p = Pattern { source: 1, tag: 7, count: 5 };
        assert!(matches(&p, &msg(1, 7, 5)));
    }

    #[test]
    fn wildcard_matches_any_positive_tag() {
        let p = Pattern { source: 0, tag: 0, count: 5 };
        assert!(matches(&p, &msg(0, 7, 5)));
        assert!(matches(&p, &msg(0, 1, 5)));
    }

    #[test]
    fn wildcard_never_matches_negative_tag() {
        let p = Pattern { source: 0, tag: 0, count: 0 };
        assert!(!matches(&p, &msg(0, -2, 0)));
    }

    #[test]
    fn source_and_count_must_match() {
        let p = Pattern { source: 1, tag: 7, count: 5 };
        assert!(!matches(&p, &msg(2, 7, 5)));
        assert!(!matches(&p, &msg(1, 7, 6)));
    }

    #[test]
    fn queue_is_fifo_per_source() {
        let q = MessageQueue::new(4);
        q.push(msg(1, 7, 0));
        q.push(msg(1, 8, 0));
        let found = q.take_matching(&Pattern { source: 1, tag: 8, count: 0 }).unwrap();
        assert_eq!(found.tag, 8);
        // the tag-7 message is still there, untouched
        assert!(q.take_matching(&Pattern { source: 1, tag: 7, count: 0 }).is_some());
    }

    #[test]
    fn payload_cell_blocks_until_fulfilled() {
        let cell = Arc::new(PayloadCell::new());
        let cell2 = cell.clone();
        let handle = std::thread::spawn(move || cell2.take());
        std::thread::sleep(std::time::Duration::from_millis(20));
        cell.fulfill(vec![1, 2, 3]);
        assert_eq!(handle.join().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn wait_for_wakes_on_left_block_for_user_recv() {
        let q = Arc::new(MessageQueue::new(4));
        let q2 = q.clone();
        let handle = std::thread::spawn(move || {
            q2.wait_for(Pattern { source: 1, tag: 5, count: 0 }, WaitKind::User { source: 1 })
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        q.set_left_block(1);
        assert!(matches!(handle.join().unwrap(), WaitOutcome::RemoteFinished));
    }

    #[test]
    fn wait_for_finds_message_that_arrives_later() {
        let q = Arc::new(MessageQueue::new(4));
        let q2 = q.clone();
        let handle = std::thread::spawn(move || {
            q2.wait_for(Pattern { source: 1, tag: 5, count: 3 }, WaitKind::User { source: 1 })
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        let m = msg(1, 5, 3);
        m.payload.fulfill(vec![9, 9, 9]);
        q.push(m);
        match handle.join().unwrap() {
            WaitOutcome::Found(found) => assert_eq!(found.payload.take(), vec![9, 9, 9]),
            _ => panic!("expected Found"),
        }
    }
}
