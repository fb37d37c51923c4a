//! Ring buffers with overflow policies.
//!
//! A buffer belongs to exactly one channel and is only touched through it.
//! When full, a put is resolved by the buffer's [`Overflow`] policy:
//!
//! | Policy   | Put on a full buffer                              |
//! |----------|---------------------------------------------------|
//! | `Reject` | fails with `BufferOverflow`, contents unchanged    |
//! | `Drop`   | the new value is discarded                        |
//! | `Slide`  | the oldest value is overwritten                   |
//! | `Expand` | capacity doubles, nothing is lost                 |

use crate::error::{Error, Result};

/// Capacity used by the factories when none is given.
pub const DEFAULT_LIMIT: usize = 10;

/// What a full buffer does with a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Overflow {
    /// Fail the put.
    Reject,
    /// Discard the new value.
    Drop,
    /// Overwrite the oldest value.
    Slide,
    /// Double the capacity.
    Expand,
}

/// Fixed-capacity circular storage.
#[derive(Debug, Clone)]
pub struct Buffer<T> {
    slots: Vec<Option<T>>,
    len: usize,
    push_idx: usize,
    pop_idx: usize,
    overflow: Overflow,
}

impl<T> Buffer<T> {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new(capacity: usize, overflow: Overflow) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            len: 0,
            push_idx: 0,
            pop_idx: 0,
            overflow,
        }
    }

    /// A zero-capacity buffer that drops everything.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, Overflow::Drop)
    }

    /// A buffer that rejects puts beyond `limit`.
    #[must_use]
    pub fn fixed(limit: usize) -> Self {
        Self::new(limit, Overflow::Reject)
    }

    /// A buffer that drops puts beyond `limit`.
    #[must_use]
    pub fn dropping(limit: usize) -> Self {
        Self::new(limit, Overflow::Drop)
    }

    /// A buffer that keeps the most recent `limit` values.
    #[must_use]
    pub fn sliding(limit: usize) -> Self {
        Self::new(limit, Overflow::Slide)
    }

    /// A buffer that starts at `initial` slots and grows as needed.
    #[must_use]
    pub fn expanding(initial: usize) -> Self {
        Self::new(initial, Overflow::Expand)
    }

    /// Returns true when nothing is buffered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buffered values.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Current capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The overflow policy.
    #[must_use]
    pub const fn overflow(&self) -> Overflow {
        self.overflow
    }

    /// Appends `value`, applying the overflow policy when full.
    pub fn put(&mut self, value: T) -> Result<()> {
        let capacity = self.capacity();
        if self.len < capacity {
            self.push(value);
            return Ok(());
        }
        match self.overflow {
            Overflow::Reject => Err(Error::buffer_overflow(capacity)),
            Overflow::Drop => Ok(()),
            Overflow::Slide => {
                if capacity > 0 {
                    self.slots[self.push_idx] = Some(value);
                    self.push_idx = (self.push_idx + 1) % capacity;
                    self.pop_idx = self.push_idx;
                }
                Ok(())
            }
            Overflow::Expand => {
                let grown = (capacity * 2).max(1);
                let items = self.flush();
                self.len = items.len();
                self.slots = items.into_iter().map(Some).collect();
                self.slots.resize_with(grown, || None);
                self.pop_idx = 0;
                self.push_idx = self.len;
                self.push(value);
                Ok(())
            }
        }
    }

    /// Removes and returns the oldest value.
    pub fn take(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = self.slots[self.pop_idx].take();
        self.len -= 1;
        self.pop_idx = (self.pop_idx + 1) % self.capacity();
        value
    }

    /// Drains every value in arrival order.
    pub fn flush(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len);
        while let Some(item) = self.take() {
            items.push(item);
        }
        items
    }

    fn push(&mut self, value: T) {
        self.slots[self.push_idx] = Some(value);
        self.push_idx = (self.push_idx + 1) % self.capacity();
        self.len += 1;
    }
}

impl<T> Default for Buffer<T> {
    fn default() -> Self {
        Self::fixed(DEFAULT_LIMIT)
    }
}
