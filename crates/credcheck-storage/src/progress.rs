use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

/// Sends upload percentages, dropping any value that would not move forward.
///
/// Cheap to clone; clones share the high-water mark so the combined stream
/// stays strictly increasing.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    tx: UnboundedSender<u8>,
    // Last emitted percentage + 1; 0 means nothing emitted yet.
    high_water: Arc<AtomicU8>,
}

impl ProgressReporter {
    pub fn new(tx: UnboundedSender<u8>) -> Self {
        Self {
            tx,
            high_water: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Emit `percent` if it is above everything sent so far. Values over 100
    /// are clamped.
    pub fn report(&self, percent: u8) -> bool {
        let percent = percent.min(100);
        let marker = percent + 1;
        let previous = self.high_water.fetch_max(marker, Ordering::SeqCst);
        if marker <= previous {
            return false;
        }
        // A dropped receiver only means nobody is watching.
        let _ = self.tx.send(percent);
        true
    }

    /// Report bytes sent out of `total`, rounded to the nearest percent.
    pub fn report_bytes(&self, sent: u64, total: u64) -> bool {
        self.report(percent_of(sent, total))
    }

    /// Emit the closing 100 if it has not been sent yet.
    pub fn finish(&self) -> bool {
        self.report(100)
    }

    pub fn last(&self) -> Option<u8> {
        match self.high_water.load(Ordering::SeqCst) {
            0 => None,
            marker => Some(marker - 1),
        }
    }
}

pub fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let sent = sent.min(total) as u128;
    let total = total as u128;
    ((sent * 100 + total / 2) / total) as u8
}
