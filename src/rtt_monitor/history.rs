//! Rolling sample history
//!
//! Two logs per target: a count-bounded buffer of the most recent samples and
//! an age-bounded buffer covering the trailing window. Appends are
//! chronological per target, so both evict from the front only.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use super::sample::Sample;

/// FIFO buffer holding at most `capacity` samples
#[derive(Debug, Clone)]
pub struct RecentBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl RecentBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}

/// Buffer of samples no older than `window` relative to the newest one
#[derive(Debug, Clone)]
pub struct WindowedBuffer {
    samples: VecDeque<Sample>,
    window: Duration,
}

impl WindowedBuffer {
    pub fn new(window: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            window,
        }
    }

    /// Append and drop every entry older than `sample.timestamp - window`
    pub fn push(&mut self, sample: Sample) {
        let now = sample.timestamp();
        self.samples.push_back(sample);

        while let Some(oldest) = self.samples.front() {
            let expired = (now - oldest.timestamp())
                .to_std()
                .map_or(false, |age| age > self.window);
            if !expired {
                break;
            }
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}

/// Both history logs for one target
#[derive(Debug, Clone)]
pub struct HistoryBuffers {
    pub recent: RecentBuffer,
    pub windowed: WindowedBuffer,
}

impl HistoryBuffers {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            recent: RecentBuffer::new(capacity),
            windowed: WindowedBuffer::new(window),
        }
    }

    pub fn append(&mut self, sample: Sample) {
        self.recent.push(sample.clone());
        self.windowed.push(sample);
    }
}

/// Lock-per-target history registry
#[derive(Debug)]
pub struct HistoryStore {
    slots: Vec<Mutex<HistoryBuffers>>,
}

impl HistoryStore {
    pub fn new(target_count: usize, capacity: usize, window: Duration) -> Self {
        Self {
            slots: (0..target_count)
                .map(|_| Mutex::new(HistoryBuffers::new(capacity, window)))
                .collect(),
        }
    }

    /// Append to both of a target's buffers under its lock.
    ///
    /// Panics if `target_index` is out of range.
    pub fn append(&self, target_index: usize, sample: Sample) {
        self.slots[target_index].lock().append(sample);
    }

    /// Run `f` against a consistent view of one target's buffers
    pub fn read<R>(&self, target_index: usize, f: impl FnOnce(&HistoryBuffers) -> R) -> R {
        f(&self.slots[target_index].lock())
    }
}
