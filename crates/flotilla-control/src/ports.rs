//! Host port allocation for module and sidecar containers.
//!
//! Allocation is sequential and monotonic within one run: a port is never
//! handed out twice, and ports reserved explicitly by configuration are
//! skipped. Nothing is persisted, so every invocation starts from the
//! beginning of the range again. Ports bound by containers from an earlier
//! run are therefore not known to the allocator.

use std::collections::BTreeSet;
use std::ops::Range;

use tracing::debug;

use crate::error::{ControlError, ControlResult};

/// Default auto-allocation range.
pub const DEFAULT_PORT_RANGE: Range<u16> = 30000..31000;

/// Hands out non-colliding host ports from a half-open range.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    range: Range<u16>,
    next: u16,
    reserved: BTreeSet<u16>,
}

impl PortAllocator {
    /// Create an allocator over `[range.start, range.end)`.
    #[must_use]
    pub fn new(range: Range<u16>) -> Self {
        Self {
            next: range.start,
            range,
            reserved: BTreeSet::new(),
        }
    }

    /// The range this allocator draws from.
    #[must_use]
    pub fn range(&self) -> Range<u16> {
        self.range.clone()
    }

    /// Draw the next unused port.
    pub fn allocate(&mut self) -> ControlResult<u16> {
        while self.next < self.range.end {
            let candidate = self.next;
            self.next += 1;

            if self.reserved.insert(candidate) {
                debug!(port = candidate, "allocated port");
                return Ok(candidate);
            }
        }

        Err(ControlError::PortRangeExhausted {
            start: self.range.start,
            end: self.range.end,
        })
    }

    /// Mark an explicitly configured port as taken.
    ///
    /// Ports outside the range are recorded too, so a second claim on them is
    /// still detected.
    pub fn reserve(&mut self, port: u16) -> ControlResult<()> {
        if !self.reserved.insert(port) {
            return Err(ControlError::PortConflict { port });
        }
        debug!(port, "reserved port");
        Ok(())
    }

    /// Whether `port` has been issued or reserved in this run.
    #[must_use]
    pub fn is_reserved(&self, port: u16) -> bool {
        self.reserved.contains(&port)
    }

    /// Every port issued or reserved so far, ascending.
    #[must_use]
    pub fn issued(&self) -> Vec<u16> {
        self.reserved.iter().copied().collect()
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_PORT_RANGE)
    }
}
