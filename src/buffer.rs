use crate::error::{TResult, TrackerError};
use crate::samples::InertialSample;

/// Fixed-capacity ring keeping the most recent samples.
///
/// Slots fill in order until the ring is full; after that every insert
/// overwrites the oldest slot at the write cursor.
#[derive(Debug, Clone)]
pub struct CircularSampleBuffer<T = InertialSample> {
    slots: Vec<T>,
    capacity: usize,
    cursor: usize,
}

impl<T> CircularSampleBuffer<T> {
    /// `capacity` must be non-zero (checked by config validation)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    pub fn append(&mut self, sample: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(sample);
        } else {
            self.slots[self.cursor] = sample;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    fn newest_index(&self) -> TResult<usize> {
        if self.slots.is_empty() {
            return Err(TrackerError::EmptyBuffer);
        }
        Ok((self.cursor + self.capacity - 1) % self.capacity)
    }

    pub fn peek_newest(&self) -> TResult<&T> {
        let idx = self.newest_index()?;
        Ok(&self.slots[idx])
    }

    pub fn peek_newest_mut(&mut self) -> TResult<&mut T> {
        let idx = self.newest_index()?;
        Ok(&mut self.slots[idx])
    }

    /// Retained samples, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let split = if self.slots.len() < self.capacity { 0 } else { self.cursor };
        self.slots[split..].iter().chain(self.slots[..split].iter())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl CircularSampleBuffer<InertialSample> {
    /// Flag the newest sample as the crash trigger point
    pub fn mark_newest_rollover(&mut self) -> TResult<()> {
        self.peek_newest_mut()?.rollover = true;
        Ok(())
    }
}
