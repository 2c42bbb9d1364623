// src/ring.rs
//! Bounded lock-free single-producer/single-consumer ring buffer.
//!
//! The hand-off point between the parser thread and the consumer. Head and
//! tail live on separate cache lines; publication pairs a release store on
//! the writer index with an acquire load on the reader side, so a popped slot
//! is always fully written. On overflow the producer drops the event rather
//! than block: the pipeline must never stall on a slow consumer. Drops are
//! counted and exposed for diagnostics.
//!
//! [`channel`] returns split [`Producer`]/[`Consumer`] handles. Neither is
//! `Clone`, and the hot-path operations take `&mut self`, so the
//! single-producer/single-consumer contract holds at compile time.

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

struct Inner<T> {
    // capacity + 1 slots; one is always a sentinel so head == tail means empty.
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    dropped: AtomicU64,
}

// The index protocol guarantees a slot is touched by exactly one side at a
// time, so sharing Inner across the two handles is sound for Send payloads.
unsafe impl<T: Send> Send for Inner<T> {}
unsafe impl<T: Send> Sync for Inner<T> {}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        let len = self.slots.len();
        let mut t = self.tail.load(Ordering::Relaxed);
        let h = self.head.load(Ordering::Relaxed);
        while t != h {
            unsafe { (*self.slots[t].get()).assume_init_drop() };
            t = (t + 1) % len;
        }
    }
}

/// Write half. Owned by the parser thread.
pub struct Producer<T> {
    inner: Arc<Inner<T>>,
}

/// Read half. Owned by the consumer thread.
pub struct Consumer<T> {
    inner: Arc<Inner<T>>,
}

/// Creates a ring holding at most `capacity` in-flight items.
pub fn channel<T: Send>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(capacity > 0, "ring capacity must be non-zero");
    let slots = (0..capacity + 1)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let inner = Arc::new(Inner {
        slots,
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
        dropped: AtomicU64::new(0),
    });

    (
        Producer {
            inner: inner.clone(),
        },
        Consumer { inner },
    )
}

impl<T: Send> Producer<T> {
    /// Pushes an item. Returns `false` (and counts a drop) when the ring is
    /// full; never blocks.
    pub fn push(&mut self, item: T) -> bool {
        let inner = &*self.inner;
        let head = inner.head.load(Ordering::Relaxed);
        let next = (head + 1) % inner.slots.len();

        if next == inner.tail.load(Ordering::Acquire) {
            inner.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        unsafe { (*inner.slots[head].get()).write(item) };
        inner.head.store(next, Ordering::Release);
        true
    }

    /// Events lost to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl<T: Send> Consumer<T> {
    /// Pops the oldest item, or `None` when the ring is empty.
    pub fn pop(&mut self) -> Option<T> {
        let inner = &*self.inner;
        let tail = inner.tail.load(Ordering::Relaxed);

        if tail == inner.head.load(Ordering::Acquire) {
            return None;
        }

        let item = unsafe { (*inner.slots[tail].get()).assume_init_read() };
        inner
            .tail
            .store((tail + 1) % inner.slots.len(), Ordering::Release);
        Some(item)
    }

    /// Events lost to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}
