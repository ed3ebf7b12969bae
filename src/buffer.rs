//! Fixed-capacity ring buffer for raw terminal output
//!
//! One drain loop writes, any number of readers pull. The readable window is
//! always the most recent `min(total_written, capacity)` bytes; anything older
//! is gone and readers that fall behind silently skip the gap.

use parking_lot::RwLock;

/// Result of an incremental read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadDelta {
    /// Bytes written since the requested position, oldest first
    pub bytes: Vec<u8>,
    /// Position to pass to the next `read_since`
    pub position: u64,
    /// Bytes between the requested position and the oldest retained byte
    pub skipped: u64,
}

struct Inner {
    data: Vec<u8>,
    write_cursor: usize,
    total_written: u64,
}

impl Inner {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn valid_len(&self) -> usize {
        self.total_written.min(self.capacity() as u64) as usize
    }

    /// Copy the newest `n` bytes (n <= `valid_len`) in chronological order
    fn copy_newest(&self, n: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(n);
        let cap = self.capacity();
        let start = (self.write_cursor + cap - n) % cap;
        if start + n <= cap {
            out.extend_from_slice(&self.data[start..start + n]);
        } else {
            out.extend_from_slice(&self.data[start..]);
            out.extend_from_slice(&self.data[..n - (cap - start)]);
        }
        out
    }
}

/// Thread-safe circular byte buffer
pub struct CircularByteBuffer {
    inner: RwLock<Inner>,
}

impl CircularByteBuffer {
    /// Allocate a buffer holding `capacity` bytes (at least one)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                data: vec![0; capacity.max(1)],
                write_cursor: 0,
                total_written: 0,
            }),
        }
    }

    /// Fixed capacity in bytes
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.read().capacity()
    }

    /// Monotonic count of bytes ever written (reset only by `clear`)
    #[must_use]
    pub fn total_written(&self) -> u64 {
        self.inner.read().total_written
    }

    /// Bytes currently readable
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().valid_len()
    }

    /// True if nothing is readable
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append bytes, overwriting the oldest data once full
    pub fn write(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut inner = self.inner.write();
        let cap = inner.capacity();
        inner.total_written += bytes.len() as u64;

        if bytes.len() >= cap {
            // Only the tail survives; lay it out from the start.
            inner.data.copy_from_slice(&bytes[bytes.len() - cap..]);
            inner.write_cursor = 0;
            return;
        }

        let cursor = inner.write_cursor;
        let first = (cap - cursor).min(bytes.len());
        inner.data[cursor..cursor + first].copy_from_slice(&bytes[..first]);
        let rest = bytes.len() - first;
        if rest > 0 {
            inner.data[..rest].copy_from_slice(&bytes[first..]);
        }
        inner.write_cursor = (cursor + bytes.len()) % cap;
    }

    /// Full readable window in chronological order
    #[must_use]
    pub fn read_all(&self) -> Vec<u8> {
        let inner = self.inner.read();
        inner.copy_newest(inner.valid_len())
    }

    /// Bytes written after `position`
    ///
    /// A position older than the retained window resumes from the oldest
    /// retained byte and reports the gap in `skipped`. A position ahead of the
    /// writer (held across a `clear`) also restarts from the oldest byte.
    #[must_use]
    pub fn read_since(&self, position: u64) -> ReadDelta {
        let inner = self.inner.read();
        let total = inner.total_written;
        let oldest = total - inner.valid_len() as u64;

        let from = if position > total {
            oldest
        } else {
            position.max(oldest)
        };
        let skipped = from.saturating_sub(position);
        let count = (total - from) as usize;

        ReadDelta {
            bytes: inner.copy_newest(count),
            position: total,
            skipped,
        }
    }

    /// Drop all data and reset counters without reallocating
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.write_cursor = 0;
        inner.total_written = 0;
    }
}

impl std::fmt::Debug for CircularByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("CircularByteBuffer")
            .field("capacity", &inner.capacity())
            .field("write_cursor", &inner.write_cursor)
            .field("total_written", &inner.total_written)
            .finish()
    }
}
