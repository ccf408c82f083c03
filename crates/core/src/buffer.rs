use std::sync::{Arc, Mutex, MutexGuard};

/// What happened to a value offered to a [`SharedBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Accepted,
    /// The buffer reached capacity with this push or before it.
    Full,
    /// The reader has taken the contents; nothing more is stored.
    Closed,
}

/// Append-only buffer handed between one background producer and one reader.
///
/// The producer appends until the buffer is full or closed. The reader calls
/// [`SharedBuffer::close`] exactly once to take a snapshot; after that every
/// push is rejected, so late writes are never observed.
pub struct SharedBuffer<T> {
    inner: Arc<SharedBufferInner<T>>,
}

struct SharedBufferInner<T> {
    state: Mutex<BufferState<T>>,
    capacity: usize,
}

struct BufferState<T> {
    items: Vec<T>,
    discarded: usize,
    closed: bool,
}

impl<T> Clone for SharedBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(SharedBufferInner {
                state: Mutex::new(BufferState {
                    items: Vec::with_capacity(capacity.min(1024)),
                    discarded: 0,
                    closed: false,
                }),
                capacity,
            }),
        }
    }

    pub fn push(&self, value: T) -> Push {
        let mut state = self.lock();
        if state.closed {
            return Push::Closed;
        }
        if state.items.len() >= self.inner.capacity {
            return Push::Full;
        }
        state.items.push(value);
        if state.items.len() >= self.inner.capacity {
            Push::Full
        } else {
            Push::Accepted
        }
    }

    /// Counts an item the producer decided not to keep.
    /// Returns false once the buffer is closed.
    pub fn record_discard(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.discarded += 1;
        true
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes the buffer and returns its items and discard count.
    /// Subsequent closes return an empty snapshot.
    pub fn close(&self) -> (Vec<T>, usize) {
        let mut state = self.lock();
        state.closed = true;
        let discarded = std::mem::take(&mut state.discarded);
        (std::mem::take(&mut state.items), discarded)
    }

    fn lock(&self) -> MutexGuard<'_, BufferState<T>> {
        // A producer that panicked mid-push leaves a consistent Vec behind.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
