//! Bounded, paced FIFO in front of each outbound interface
//!
//! A full queue rejects the incoming entry (reject-newest) so packets that
//! already carry provenance are never displaced by fresher samples. Sends are
//! paced: a new attempt is only handed out once the waiting period has passed
//! since the previous attempt on the same queue. A failed send is retried on a
//! later pacing tick up to `max_retries` times, then dropped, so a dead link
//! cannot stall newer traffic forever.
//!
//! The head entry stays in the queue while its send is in flight. It still
//! counts toward the depth, which keeps retries in FIFO position without ever
//! holding more than `capacity` entries.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

use crate::types::{Millis, QueueKind};
use crate::{CollectionError, Result};

/// Result reported by the transport for the last handed-out entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Failed,
}

/// Queued item with its bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry<T> {
    pub item: T,
    pub enqueued_at: Millis,
    /// Send attempts made so far
    pub attempts: u8,
}

/// What happened to the in-flight entry on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<T> {
    /// Sent; entry removed
    Delivered(QueueEntry<T>),
    /// Failed; entry stays at the head for another attempt
    Retrying { attempts: u8 },
    /// Failed too often; entry removed
    Dropped(QueueEntry<T>),
    /// No send was in flight
    Idle,
}

/// Counters kept per queue. Failures are counted here, never escalated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub rejected_full: u64,
    pub sent: u64,
    pub send_failures: u64,
    pub dropped_after_retries: u64,
}

#[derive(Debug)]
pub struct ForwardingQueue<T> {
    kind: QueueKind,
    capacity: usize,
    waiting_period: Millis,
    max_retries: u8,
    entries: VecDeque<QueueEntry<T>>,
    in_flight: bool,
    last_attempt: Option<Millis>,
    stats: QueueStats,
}

impl<T: Clone> ForwardingQueue<T> {
    pub fn new(kind: QueueKind, capacity: usize, waiting_period: Millis, max_retries: u8) -> Self {
        Self {
            kind,
            capacity,
            waiting_period,
            max_retries,
            entries: VecDeque::with_capacity(capacity),
            in_flight: false,
            last_attempt: None,
            stats: QueueStats::default(),
        }
    }

    /// Append `item` unless the queue is full.
    ///
    /// On a full queue the item is dropped, the queue is left unchanged and
    /// the rejection is counted.
    pub fn enqueue(&mut self, item: T, now: Millis) -> Result<()> {
        if self.entries.len() >= self.capacity {
            self.stats.rejected_full += 1;
            debug!(queue = %self.kind, capacity = self.capacity, "Queue full, rejecting newest entry");
            return Err(CollectionError::queue_full(self.kind, self.capacity));
        }
        self.entries.push_back(QueueEntry { item, enqueued_at: now, attempts: 0 });
        self.stats.enqueued += 1;
        trace!(queue = %self.kind, depth = self.entries.len(), "Enqueued");
        Ok(())
    }

    /// Hand out the oldest entry for sending if the pacing window is open.
    ///
    /// Returns `None` while a send is in flight, when the queue is empty, or
    /// before the waiting period since the previous attempt has elapsed. The
    /// caller must report the result through [`complete_send`](Self::complete_send).
    pub fn dequeue_for_send(&mut self, now: Millis) -> Option<T> {
        if self.in_flight || !self.window_open(now) {
            return None;
        }
        let head = self.entries.front_mut()?;
        head.attempts = head.attempts.saturating_add(1);
        self.in_flight = true;
        self.last_attempt = Some(now);
        trace!(queue = %self.kind, attempt = head.attempts, "Send attempt");
        Some(head.item.clone())
    }

    /// Settle the in-flight entry.
    pub fn complete_send(&mut self, outcome: SendOutcome, now: Millis) -> Completion<T> {
        if !self.in_flight {
            return Completion::Idle;
        }
        self.in_flight = false;

        match outcome {
            SendOutcome::Sent => match self.entries.pop_front() {
                Some(entry) => {
                    self.stats.sent += 1;
                    trace!(queue = %self.kind, waited = now.saturating_sub(entry.enqueued_at), "Sent");
                    Completion::Delivered(entry)
                }
                None => Completion::Idle,
            },
            SendOutcome::Failed => {
                self.stats.send_failures += 1;
                let attempts = match self.entries.front() {
                    Some(head) => head.attempts,
                    None => return Completion::Idle,
                };
                if attempts > self.max_retries {
                    self.stats.dropped_after_retries += 1;
                    warn!(queue = %self.kind, attempts, "Dropping entry after repeated send failures");
                    match self.entries.pop_front() {
                        Some(entry) => Completion::Dropped(entry),
                        None => Completion::Idle,
                    }
                } else {
                    debug!(queue = %self.kind, attempts, "Send failed, will retry");
                    Completion::Retrying { attempts }
                }
            }
        }
    }

    /// Whether a new attempt may start at `now`.
    pub fn window_open(&self, now: Millis) -> bool {
        self.last_attempt.is_none_or(|last| now.saturating_sub(last) >= self.waiting_period)
    }

    /// Earliest time the next attempt may start.
    pub fn next_send_at(&self) -> Option<Millis> {
        self.last_attempt.map(|last| last + self.waiting_period)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    /// Queued items, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|entry| &entry.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::constants::{SEND_QUEUE_DEPTH, WAITING_PERIOD_RADIO};
    use proptest::prelude::*;

    fn radio_queue() -> ForwardingQueue<u32> {
        ForwardingQueue::new(QueueKind::Radio, SEND_QUEUE_DEPTH, WAITING_PERIOD_RADIO, 2)
    }

    #[test]
    fn rejects_newest_when_full() {
        let mut queue = radio_queue();
        for i in 0..SEND_QUEUE_DEPTH as u32 {
            queue.enqueue(i, 0).unwrap();
        }
        let err = queue.enqueue(99, 0).unwrap_err();
        assert!(matches!(err, CollectionError::QueueFull { capacity: 20, .. }));
        assert_eq!(queue.len(), SEND_QUEUE_DEPTH);
        assert!(queue.iter().all(|&item| item != 99));
        assert_eq!(queue.stats().rejected_full, 1);
    }

    #[test]
    fn pacing_window_spaces_attempts() {
        let mut queue = radio_queue();
        queue.enqueue(1, 0).unwrap();
        queue.enqueue(2, 0).unwrap();

        assert_eq!(queue.dequeue_for_send(0), Some(1));
        // in flight
        assert_eq!(queue.dequeue_for_send(0), None);
        queue.complete_send(SendOutcome::Sent, 5);

        assert_eq!(queue.dequeue_for_send(999), None);
        assert_eq!(queue.next_send_at(), Some(1000));
        assert_eq!(queue.dequeue_for_send(1000), Some(2));
    }

    #[test]
    fn failed_send_retries_then_drops() {
        let mut queue = radio_queue();
        queue.enqueue(7, 0).unwrap();
        queue.enqueue(8, 0).unwrap();

        let mut now = 0;
        for expected_attempts in 1..=2u8 {
            assert_eq!(queue.dequeue_for_send(now), Some(7));
            assert_eq!(
                queue.complete_send(SendOutcome::Failed, now),
                Completion::Retrying { attempts: expected_attempts }
            );
            now += WAITING_PERIOD_RADIO;
        }

        assert_eq!(queue.dequeue_for_send(now), Some(7));
        match queue.complete_send(SendOutcome::Failed, now) {
            Completion::Dropped(entry) => {
                assert_eq!(entry.item, 7);
                assert_eq!(entry.attempts, 3);
            }
            other => panic!("expected drop, got {other:?}"),
        }

        now += WAITING_PERIOD_RADIO;
        assert_eq!(queue.dequeue_for_send(now), Some(8));
        let stats = queue.stats();
        assert_eq!(stats.send_failures, 3);
        assert_eq!(stats.dropped_after_retries, 1);
    }

    #[test]
    fn completion_without_send_is_idle() {
        let mut queue = radio_queue();
        queue.enqueue(1, 0).unwrap();
        assert_eq!(queue.complete_send(SendOutcome::Sent, 0), Completion::Idle);
        assert_eq!(queue.len(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enqueue,
        Send { advance: u64, ok: bool },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Enqueue),
            (0u64..2500, any::<bool>()).prop_map(|(advance, ok)| Op::Send { advance, ok }),
        ]
    }

    proptest! {
        #[test]
        fn depth_tracks_enqueues_up_to_capacity(n in 0usize..=SEND_QUEUE_DEPTH) {
            let mut queue = radio_queue();
            for i in 0..n {
                prop_assert!(queue.enqueue(i as u32, 0).is_ok());
            }
            prop_assert_eq!(queue.len(), n);
            if n == SEND_QUEUE_DEPTH {
                prop_assert!(queue.enqueue(1000, 0).is_err());
                prop_assert_eq!(queue.len(), n);
            }
        }

        #[test]
        fn fifo_order_and_pacing_hold_for_any_interleaving(
            ops in prop::collection::vec(op(), 1..200),
        ) {
            let mut queue = radio_queue();
            let mut next_item = 0u32;
            let mut now = 0u64;
            let mut accepted = Vec::new();
            let mut delivered = Vec::new();
            let mut dropped = Vec::new();
            let mut attempt_times = Vec::new();

            for op in ops {
                match op {
                    Op::Enqueue => {
                        if queue.enqueue(next_item, now).is_ok() {
                            accepted.push(next_item);
                        }
                        next_item += 1;
                    }
                    Op::Send { advance, ok } => {
                        now += advance;
                        if queue.dequeue_for_send(now).is_some() {
                            attempt_times.push(now);
                            let outcome = if ok { SendOutcome::Sent } else { SendOutcome::Failed };
                            match queue.complete_send(outcome, now) {
                                Completion::Delivered(entry) => delivered.push(entry.item),
                                Completion::Dropped(entry) => dropped.push(entry.item),
                                _ => {}
                            }
                        }
                    }
                }
                prop_assert!(queue.len() <= queue.capacity());
            }

            // Everything that left the queue left in enqueue order.
            let mut left: Vec<u32> = delivered.iter().chain(dropped.iter()).copied().collect();
            left.sort_unstable();
            let prefix = &accepted[..left.len()];
            prop_assert_eq!(left.as_slice(), prefix);
            prop_assert!(delivered.windows(2).all(|w| w[0] < w[1]));

            for pair in attempt_times.windows(2) {
                prop_assert!(pair[1] - pair[0] >= WAITING_PERIOD_RADIO);
            }
        }
    }
}
