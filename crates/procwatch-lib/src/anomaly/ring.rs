//! Fixed-capacity sample ring
//!
//! All wraparound arithmetic for the metric trackers lives here. Slots are
//! written sequentially from index 0, so until the ring fills up the valid
//! samples are exactly `slots[..len]`; once full every slot is valid and the
//! oldest one is overwritten next.

/// Samples retained per metric stream
pub const SAMPLE_CAPACITY: usize = 100;

/// Circular buffer of `f64` samples with a compile-time capacity
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRing<const N: usize = SAMPLE_CAPACITY> {
    slots: [f64; N],
    len: usize,
    write_index: usize,
}

impl<const N: usize> SampleRing<N> {
    pub fn new() -> Self {
        Self {
            slots: [0.0; N],
            len: 0,
            write_index: 0,
        }
    }

    /// Insert a sample, returning the value it evicted once the ring is full
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let evicted = if self.len == N {
            Some(self.slots[self.write_index])
        } else {
            self.len += 1;
            None
        };

        self.slots[self.write_index] = value;
        self.write_index = (self.write_index + 1) % N;
        evicted
    }

    /// Most recently inserted sample
    pub fn latest(&self) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        Some(self.slots[(self.write_index + N - 1) % N])
    }

    /// Oldest sample still retained
    pub fn oldest(&self) -> Option<f64> {
        self.iter_recent().last()
    }

    /// Walk samples from newest to oldest following the logical insertion order
    pub fn iter_recent(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len).map(move |age| self.slots[(self.write_index + N - 1 - age) % N])
    }

    /// Valid samples in storage order (order-independent aggregates only)
    pub fn as_slice(&self) -> &[f64] {
        &self.slots[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Slot the next sample will be written to
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl<const N: usize> Default for SampleRing<N> {
    fn default() -> Self {
        Self::new()
    }
}
