/// Point-in-time view of a file batch transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Files attempted so far (successful or not).
    pub completed: usize,
    /// Files in the batch.
    pub total: usize,
    /// Files whose upload and registration both succeeded.
    pub succeeded: usize,
    /// Chunk bytes acknowledged by the server.
    pub bytes_sent: u64,
}

impl Progress {
    /// Files attempted but not synchronized.
    pub fn failed(&self) -> usize {
        self.completed - self.succeeded
    }

    /// Completion ratio in `0.0..=1.0`. An empty batch counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completed >= self.total
    }
}

/// Running completed/total counter for one workflow's file batch.
///
/// Owned by the single upload loop; readers get [`Progress`] snapshots.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    inner: Progress,
}

impl ProgressCounter {
    /// Starts a counter for a batch of `total` files.
    pub fn new(total: usize) -> Self {
        Self {
            inner: Progress {
                total,
                ..Progress::default()
            },
        }
    }

    /// Records acknowledged chunk bytes.
    pub fn add_bytes(&mut self, bytes: u64) {
        self.inner.bytes_sent += bytes;
    }

    /// Records the end of one file attempt.
    pub fn file_done(&mut self, success: bool) -> Progress {
        if self.inner.completed < self.inner.total {
            self.inner.completed += 1;
            if success {
                self.inner.succeeded += 1;
            }
        }
        self.inner
    }

    pub fn snapshot(&self) -> Progress {
        self.inner
    }
}
