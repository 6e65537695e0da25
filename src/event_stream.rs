//! Capped, multi-subscriber event stream used for live tailing.
//!
//! [`CappedEventStream`] keeps the most recent `capacity` items in a ring
//! and hands out [`Subscriber`] cursors. Publishing never blocks: when the
//! ring is full the oldest item is evicted. Each subscriber reads at its own
//! pace; one that falls behind the ring resumes at the oldest retained item
//! and is told how many items it missed via [`Event::missed`].
//!
//! Subscribers park on a condition variable while waiting, so a reader only
//! ever suspends its own thread. The publisher only signals when at least
//! one reader is parked.

use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Capacity used by [`CappedEventStream::with_default_capacity`].
pub const DEFAULT_STREAM_CAPACITY: usize = 100;

/// [`DEFAULT_STREAM_CAPACITY`] as a [`NonZeroUsize`].
pub fn default_capacity() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_STREAM_CAPACITY).unwrap_or(NonZeroUsize::MIN)
}

/// Error returned by [`Subscriber::recv`] once the subscriber was cancelled
/// or the stream closed and drained.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("event stream subscriber closed")]
pub struct RecvError;

/// Error returned by [`Subscriber::try_recv`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum TryRecvError {
    #[error("no new events available")]
    Empty,
    #[error("event stream subscriber closed")]
    Closed,
}

/// Error returned by [`Subscriber::recv_timeout`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RecvTimeoutError {
    #[error("timed out waiting for an event")]
    Timeout,
    #[error("event stream subscriber closed")]
    Closed,
}

/// An item delivered to a subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event<T> {
    /// Sequence number assigned at publish time, starting at 1.
    pub seq: u64,
    /// Items evicted before this subscriber could read them. Non-zero marks
    /// a catch-up to the oldest retained item.
    pub missed: u64,
    pub item: T,
}

impl<T> Event<T> {
    /// Whether the subscriber skipped evicted items to reach this one.
    pub fn is_catch_up(&self) -> bool {
        self.missed > 0
    }
}

struct Ring<T> {
    items: VecDeque<T>,
    /// Sequence number the next published item receives.
    next_seq: u64,
    subscribers: usize,
    /// Readers currently parked on the condvar.
    waiting: usize,
    closed: bool,
}

impl<T> Ring<T> {
    fn oldest_seq(&self) -> u64 {
        self.next_seq - self.items.len() as u64
    }
}

struct Shared<T> {
    ring: Mutex<Ring<T>>,
    available: Condvar,
    capacity: NonZeroUsize,
}

impl<T> Shared<T> {
    /// Mark `flag` cancelled and unregister the subscriber it belongs to.
    ///
    /// Runs at most once per subscriber.
    fn cancel(&self, flag: &AtomicBool) {
        if flag.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut ring = self.ring.lock();
        ring.subscribers = ring.subscribers.saturating_sub(1);
        drop(ring);
        self.available.notify_all();
    }
}

/// Bounded, ordered publish/subscribe buffer.
///
/// The stream is owned by its producer. Dropping it closes the stream:
/// subscribers drain what is still retained and then see [`RecvError`].
pub struct CappedEventStream<T> {
    shared: Arc<Shared<T>>,
}

impl<T> CappedEventStream<T> {
    /// Create a stream retaining at most `capacity` items.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            shared: Arc::new(Shared {
                ring: Mutex::new(Ring {
                    items: VecDeque::with_capacity(capacity.get()),
                    next_seq: 1,
                    subscribers: 0,
                    waiting: 0,
                    closed: false,
                }),
                available: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Create a stream with [`DEFAULT_STREAM_CAPACITY`].
    pub fn with_default_capacity() -> Self {
        Self::new(default_capacity())
    }

    /// Append `item`, evicting the oldest item when full.
    ///
    /// Returns the assigned sequence number, or `None` if the stream has
    /// been closed.
    pub fn publish(&self, item: T) -> Option<u64> {
        let mut ring = self.shared.ring.lock();
        if ring.closed {
            return None;
        }
        if ring.items.len() == self.shared.capacity.get() {
            ring.items.pop_front();
        }
        ring.items.push_back(item);
        let seq = ring.next_seq;
        ring.next_seq += 1;
        let wake = ring.waiting > 0;
        drop(ring);
        if wake {
            self.shared.available.notify_all();
        }
        Some(seq)
    }

    /// Subscribe to items published from now on.
    pub fn subscribe(&self) -> Subscriber<T> {
        self.register(|ring| ring.next_seq)
    }

    /// Subscribe starting from the oldest retained item.
    pub fn subscribe_from_oldest(&self) -> Subscriber<T> {
        self.register(Ring::oldest_seq)
    }

    fn register(&self, start: impl FnOnce(&Ring<T>) -> u64) -> Subscriber<T> {
        let mut ring = self.shared.ring.lock();
        ring.subscribers += 1;
        let cursor = start(&ring);
        drop(ring);
        Subscriber {
            shared: Arc::clone(&self.shared),
            cursor,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Close the stream and wake every parked subscriber.
    ///
    /// Later publishes are ignored. Subscribers still receive retained
    /// items they have not read yet.
    pub fn close(&self) {
        let mut ring = self.shared.ring.lock();
        ring.closed = true;
        drop(ring);
        self.shared.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.ring.lock().closed
    }

    /// Number of retained items.
    pub fn len(&self) -> usize {
        self.shared.ring.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.ring.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity.get()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.ring.lock().subscribers
    }

    /// Sequence number of the oldest retained item.
    pub fn oldest_seq(&self) -> Option<u64> {
        let ring = self.shared.ring.lock();
        (!ring.items.is_empty()).then(|| ring.oldest_seq())
    }

    /// Sequence number of the newest item.
    pub fn latest_seq(&self) -> Option<u64> {
        let ring = self.shared.ring.lock();
        (!ring.items.is_empty()).then(|| ring.next_seq - 1)
    }
}

impl<T> Default for CappedEventStream<T> {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl<T> Drop for CappedEventStream<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> fmt::Debug for CappedEventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ring = self.shared.ring.lock();
        f.debug_struct("CappedEventStream")
            .field("capacity", &self.shared.capacity)
            .field("len", &ring.items.len())
            .field("next_seq", &ring.next_seq)
            .field("subscribers", &ring.subscribers)
            .field("closed", &ring.closed)
            .finish()
    }
}

/// Independent read cursor over a [`CappedEventStream`].
///
/// Dropping the subscriber (or calling [`Subscriber::close`]) unregisters
/// it immediately.
pub struct Subscriber<T> {
    shared: Arc<Shared<T>>,
    /// Sequence number of the next item to deliver.
    cursor: u64,
    cancelled: Arc<AtomicBool>,
}

impl<T: Clone> Subscriber<T> {
    /// Block until the next unread item is available.
    pub fn recv(&mut self) -> Result<Event<T>, RecvError> {
        self.recv_until(None).map_err(|_| RecvError)
    }

    /// Return the next unread item without blocking.
    pub fn try_recv(&mut self) -> Result<Event<T>, TryRecvError> {
        let ring = self.shared.ring.lock();
        if self.is_closed() {
            return Err(TryRecvError::Closed);
        }
        if let Some(event) = take_ready(&mut self.cursor, &ring) {
            return Ok(event);
        }
        if ring.closed {
            Err(TryRecvError::Closed)
        } else {
            Err(TryRecvError::Empty)
        }
    }

    /// Block for at most `timeout` waiting for the next unread item.
    ///
    /// A timeout too large to express as a deadline waits without limit.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Event<T>, RecvTimeoutError> {
        self.recv_until(Instant::now().checked_add(timeout))
    }

    fn recv_until(&mut self, deadline: Option<Instant>) -> Result<Event<T>, RecvTimeoutError> {
        let mut ring = self.shared.ring.lock();
        loop {
            if self.is_closed() {
                return Err(RecvTimeoutError::Closed);
            }
            if let Some(event) = take_ready(&mut self.cursor, &ring) {
                return Ok(event);
            }
            if ring.closed {
                return Err(RecvTimeoutError::Closed);
            }

            ring.waiting += 1;
            let timed_out = match deadline {
                Some(deadline) => self
                    .shared
                    .available
                    .wait_until(&mut ring, deadline)
                    .timed_out(),
                None => {
                    self.shared.available.wait(&mut ring);
                    false
                }
            };
            ring.waiting -= 1;

            if timed_out {
                if self.is_closed() {
                    return Err(RecvTimeoutError::Closed);
                }
                return match take_ready(&mut self.cursor, &ring) {
                    Some(event) => Ok(event),
                    None if ring.closed => Err(RecvTimeoutError::Closed),
                    None => Err(RecvTimeoutError::Timeout),
                };
            }
        }
    }
}

/// Deliver the oldest unread item still retained, advancing `cursor`.
fn take_ready<T: Clone>(cursor: &mut u64, ring: &Ring<T>) -> Option<Event<T>> {
    if *cursor >= ring.next_seq {
        return None;
    }
    let oldest = ring.oldest_seq();
    let (seq, missed) = if *cursor < oldest {
        (oldest, oldest - *cursor)
    } else {
        (*cursor, 0)
    };
    let item = ring.items.get((seq - oldest) as usize)?.clone();
    *cursor = seq + 1;
    Some(Event { seq, missed, item })
}

impl<T> Subscriber<T> {
    /// Sequence number of the next item this subscriber expects.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Whether this subscriber was closed or cancelled.
    pub fn is_closed(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Handle that cancels this subscriber from another thread, waking it
    /// if it is blocked in [`Subscriber::recv`].
    pub fn canceller(&self) -> SubscriberCanceller<T> {
        SubscriberCanceller {
            shared: Arc::clone(&self.shared),
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// Unregister from the stream.
    pub fn close(self) {
        drop(self);
    }
}

impl<T: Clone> Iterator for Subscriber<T> {
    type Item = Event<T>;

    /// Blocks like [`Subscriber::recv`]; ends when the subscriber closes.
    fn next(&mut self) -> Option<Self::Item> {
        self.recv().ok()
    }
}

impl<T> Drop for Subscriber<T> {
    fn drop(&mut self) {
        self.shared.cancel(&self.cancelled);
    }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("cursor", &self.cursor)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Cloneable handle cancelling one [`Subscriber`].
pub struct SubscriberCanceller<T> {
    shared: Arc<Shared<T>>,
    cancelled: Arc<AtomicBool>,
}

impl<T> SubscriberCanceller<T> {
    /// Cancel the subscriber. Idempotent.
    pub fn cancel(&self) {
        self.shared.cancel(&self.cancelled);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl<T> Clone for SubscriberCanceller<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            cancelled: Arc::clone(&self.cancelled),
        }
    }
}
