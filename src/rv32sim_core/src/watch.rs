//! Memory watcher: callback interposition over declared address ranges.
//!
//! Used by host rendezvous protocols (HTIF) that claim a handful of magic
//! addresses. An access that intersects a watched range is diverted to the
//! range's callback instead of the underlying store; everything else passes
//! through untouched.

use crate::state::HartView;

/// Read-side hook. Fills the buffer on behalf of the underlying memory.
pub type ReadHook = Box<dyn FnMut(&mut HartView<'_>, u32, &mut [u8]) + Send>;

/// Write-side hook. Consumes the store on behalf of the underlying memory.
pub type WriteHook = Box<dyn FnMut(&mut HartView<'_>, u32, &[u8]) + Send>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WatchError {
    #[error("watch range {base:#010x}+{len:#x} overlaps an existing range")]
    Overlap { base: u32, len: u32 },
    #[error("watch range may not be empty")]
    Empty,
}

struct WatchRange {
    base: u32,
    len: u32,
    on_read: Option<ReadHook>,
    on_write: Option<WriteHook>,
}

impl WatchRange {
    fn intersects(&self, addr: u32, len: u32) -> bool {
        let end = addr.wrapping_add(len);
        addr < self.base.wrapping_add(self.len) && end > self.base
    }
}

/// A set of non-overlapping watched ranges.
#[derive(Default)]
pub struct MemoryWatcher {
    ranges: Vec<WatchRange>,
}

impl MemoryWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watched range. Overlap with an existing range is rejected.
    pub fn watch(
        &mut self,
        base: u32,
        len: u32,
        on_read: Option<ReadHook>,
        on_write: Option<WriteHook>,
    ) -> Result<(), WatchError> {
        if len == 0 {
            return Err(WatchError::Empty);
        }
        if self.ranges.iter().any(|r| r.intersects(base, len)) {
            return Err(WatchError::Overlap { base, len });
        }
        log::debug!("watching {base:#010x}+{len:#x}");
        self.ranges.push(WatchRange {
            base,
            len,
            on_read,
            on_write,
        });
        Ok(())
    }

    /// Index of the range intersecting `[addr, addr+len)`, if any.
    pub(crate) fn find(&self, addr: u32, len: u32) -> Option<usize> {
        self.ranges.iter().position(|r| r.intersects(addr, len))
    }

    /// Whether the read at `idx` is diverted (has a read hook).
    pub(crate) fn dispatch_read(
        &mut self,
        idx: usize,
        view: &mut HartView<'_>,
        addr: u32,
        buf: &mut [u8],
    ) -> bool {
        match &mut self.ranges[idx].on_read {
            Some(hook) => {
                hook(view, addr, buf);
                true
            }
            None => false,
        }
    }

    /// Whether the write at `idx` is diverted (has a write hook).
    pub(crate) fn dispatch_write(
        &mut self,
        idx: usize,
        view: &mut HartView<'_>,
        addr: u32,
        bytes: &[u8],
    ) -> bool {
        match &mut self.ranges[idx].on_write {
            Some(hook) => {
                hook(view, addr, bytes);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_is_rejected() {
        let mut watcher = MemoryWatcher::new();
        watcher.watch(0x1000, 8, None, None).unwrap();
        assert_eq!(
            watcher.watch(0x1004, 8, None, None),
            Err(WatchError::Overlap {
                base: 0x1004,
                len: 8
            })
        );
        // Adjacent ranges are fine.
        watcher.watch(0x1008, 8, None, None).unwrap();
        assert_eq!(watcher.watch(0, 0, None, None), Err(WatchError::Empty));
    }

    #[test]
    fn find_reports_partial_intersections() {
        let mut watcher = MemoryWatcher::new();
        watcher.watch(0x1000, 8, None, None).unwrap();
        assert_eq!(watcher.find(0x0ffc, 4), None);
        assert_eq!(watcher.find(0x0ffd, 4), Some(0));
        assert_eq!(watcher.find(0x1007, 1), Some(0));
        assert_eq!(watcher.find(0x1008, 4), None);
    }
}
