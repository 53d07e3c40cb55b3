//! Library state-change events and the publisher seam.
//!
//! # Responsibility
//! - Describe every state change subscribers can observe.
//! - Fan events out to in-process subscribers without coupling core writes
//!   to delivery.
//!
//! # Invariants
//! - `EventPublisher::publish` never fails and never blocks on a subscriber.
//! - Events are published only after the underlying write committed.
//! - Delivery is best-effort and at-most-once per subscriber; a subscriber
//!   that falls more than the channel capacity behind loses the oldest events.

use crate::model::book::{Book, BookId};
use crate::model::loan::{Loan, LoanId};
use crate::model::member::{Member, MemberId};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// State change broadcast to connected clients.
///
/// Serialized as `{"type": "<event_name>", ...payload}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LibraryEvent {
    BookAdded {
        book: Book,
    },
    BookUpdated {
        book: Book,
    },
    BookDeleted {
        id: BookId,
    },
    MemberAdded {
        member: Member,
    },
    BookBorrowed {
        loan: Loan,
        member_name: String,
        book_title: String,
    },
    BookReturned {
        loan_id: LoanId,
        book_id: BookId,
        member_id: MemberId,
    },
}

impl LibraryEvent {
    /// Stable wire name, identical to the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BookAdded { .. } => "book_added",
            Self::BookUpdated { .. } => "book_updated",
            Self::BookDeleted { .. } => "book_deleted",
            Self::MemberAdded { .. } => "member_added",
            Self::BookBorrowed { .. } => "book_borrowed",
            Self::BookReturned { .. } => "book_returned",
        }
    }
}

/// Outbound port for state-change events.
pub trait EventPublisher: Send + Sync {
    /// Fire-and-forget publish; implementations swallow and log failures.
    fn publish(&self, event: &LibraryEvent);
}

/// Publisher that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, event: &LibraryEvent) {
        debug!(
            "event=event_publish module=events status=skipped kind={}",
            event.name()
        );
    }
}

/// Events a subscriber can fall behind by before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// In-process fan-out over a bounded broadcast ring.
///
/// Publishing never waits: a subscriber that stops reading loses the oldest
/// events once it is `capacity` behind.
#[derive(Debug)]
pub struct ChannelPublisher {
    sender: broadcast::Sender<LibraryEvent>,
    capacity: usize,
}

impl Default for ChannelPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelPublisher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// `capacity` is raised to 1 when zero.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Registers a subscriber that receives every event published from now on.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            missed: 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl EventPublisher for ChannelPublisher {
    fn publish(&self, event: &LibraryEvent) {
        match self.sender.send(event.clone()) {
            Ok(delivered) => debug!(
                "event=event_publish module=events status=ok kind={} delivered={delivered}",
                event.name()
            ),
            Err(_) => debug!(
                "event=event_publish module=events status=skipped kind={} reason=no_subscribers",
                event.name()
            ),
        }
    }
}

/// Receiving end of a [`ChannelPublisher`].
#[derive(Debug)]
pub struct EventSubscription {
    receiver: broadcast::Receiver<LibraryEvent>,
    missed: u64,
}

impl EventSubscription {
    /// Next buffered event, skipping past any that were overwritten.
    ///
    /// `None` when nothing is pending or the publisher is gone.
    pub fn try_recv(&mut self) -> Option<LibraryEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Waits for the next event; `None` once the publisher is dropped.
    ///
    /// Must not be called from inside an async runtime.
    pub fn recv_blocking(&mut self) -> Option<LibraryEvent> {
        loop {
            match self.receiver.blocking_recv() {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Every event currently pending, oldest first.
    pub fn drain(&mut self) -> Vec<LibraryEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Events this subscriber lost by falling behind.
    pub fn missed(&self) -> u64 {
        self.missed
    }

    fn record_lag(&mut self, skipped: u64) {
        self.missed += skipped;
        warn!("event=event_subscriber_lagged module=events status=dropped skipped={skipped}");
    }
}

/// Collects events during a unit of work so they can be handed to the real
/// publisher after the store lock is released.
#[derive(Debug, Default)]
pub struct EventBuffer {
    pending: Mutex<Vec<LibraryEvent>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes every collected event to `target` in order; returns how many.
    pub fn flush_into(&self, target: &dyn EventPublisher) -> usize {
        let pending = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for event in &pending {
            target.publish(event);
        }
        pending.len()
    }
}

impl EventPublisher for EventBuffer {
    fn publish(&self, event: &LibraryEvent) {
        match self.pending.lock() {
            Ok(mut pending) => pending.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelPublisher, EventBuffer, EventPublisher, LibraryEvent};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn deleted() -> LibraryEvent {
        LibraryEvent::BookDeleted { id: Uuid::new_v4() }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<LibraryEvent>>);

    impl EventPublisher for Recording {
        fn publish(&self, event: &LibraryEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn every_live_subscriber_receives_the_event() {
        let publisher = ChannelPublisher::new();
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();

        let event = deleted();
        publisher.publish(&event);

        assert_eq!(first.try_recv(), Some(event.clone()));
        assert_eq!(second.try_recv(), Some(event));
        assert_eq!(first.try_recv(), None);
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let publisher = ChannelPublisher::new();
        drop(publisher.subscribe());
        assert_eq!(publisher.subscriber_count(), 0);

        publisher.publish(&deleted());

        let mut late = publisher.subscribe();
        assert_eq!(late.try_recv(), None);
    }

    #[test]
    fn stalled_subscriber_keeps_only_the_newest_events() {
        let publisher = ChannelPublisher::with_capacity(8);
        let mut stalled = publisher.subscribe();

        let events: Vec<LibraryEvent> = (0..10_000).map(|_| deleted()).collect();
        for event in &events {
            publisher.publish(event);
        }

        let pending = stalled.drain();
        assert_eq!(pending.len(), publisher.capacity());
        assert_eq!(pending.as_slice(), &events[events.len() - 8..]);
        assert_eq!(stalled.missed(), 10_000 - 8);
        assert_eq!(stalled.try_recv(), None);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let publisher = ChannelPublisher::with_capacity(0);
        let mut inbox = publisher.subscribe();
        publisher.publish(&deleted());
        assert_eq!(publisher.capacity(), 1);
        assert!(inbox.try_recv().is_some());
    }

    #[test]
    fn buffer_holds_events_until_flushed_in_order() {
        let buffer = EventBuffer::new();
        let target = Recording::default();
        let first = deleted();
        let second = deleted();

        buffer.publish(&first);
        buffer.publish(&second);
        assert!(target.0.lock().unwrap().is_empty());

        assert_eq!(buffer.flush_into(&target), 2);
        assert_eq!(*target.0.lock().unwrap(), vec![first, second]);
        assert_eq!(buffer.flush_into(&target), 0);
    }

    #[test]
    fn events_serialize_with_snake_case_type_tag() {
        let loan_id = Uuid::new_v4();
        let event = LibraryEvent::BookReturned {
            loan_id,
            book_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "book_returned");
        assert_eq!(json["type"], event.name());
        assert_eq!(json["loanId"], loan_id.to_string());
    }
}
