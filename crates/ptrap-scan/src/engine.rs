//! Page-window scan over a process's readable memory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ptrap_platform::{MemoryRegion, ProcessControl};
use tracing::{debug, info, trace};

use crate::error::ScanError;
use crate::matches::MatchList;
use crate::value::ScanQuery;

/// Default page size of the scan window.
pub const DEFAULT_PAGE_SIZE: usize = 0x4000;

/// Outcome of a scan.
#[derive(Debug)]
pub struct ScanOutcome {
    pub matches: Vec<u64>,
    /// Whether the scan stopped early on cancellation.
    pub cancelled: bool,
    pub regions_scanned: usize,
    pub pages_skipped: usize,
}

/// Walks memory one page at a time and applies a [`ScanQuery`].
#[derive(Debug, Clone)]
pub struct Scanner {
    page_size: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Scanner {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            cancel: None,
        }
    }

    /// Stop at the next page refill once `flag` becomes true.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Fetch the memory map of `query.pid`.
    pub fn memory_map(
        &self,
        control: &dyn ProcessControl,
        pid: u32,
    ) -> Result<Vec<MemoryRegion>, ScanError> {
        Ok(control.memory_map(pid)?)
    }

    /// Scan every readable region of `regions`.
    ///
    /// Candidate addresses step by the value width from each region's
    /// start. Each page is read once, extended past its end by up to
    /// the value width so values straddling two pages see real bytes.
    /// When the extension cannot be read the page is read alone, and
    /// pages that cannot be read at all are skipped.
    pub fn scan(
        &self,
        control: &dyn ProcessControl,
        regions: &[MemoryRegion],
        query: &ScanQuery,
    ) -> Result<ScanOutcome, ScanError> {
        let size = query.value_size();
        if size == 0 {
            return Err(ScanError::EmptyValue);
        }
        let mut page = Vec::new();
        page.try_reserve_exact(self.page_size + size)
            .map_err(|_| ScanError::AllocationFailed { what: "page buffer" })?;
        let mut matches = MatchList::new()?;
        let mut outcome = ScanOutcome {
            matches: Vec::new(),
            cancelled: false,
            regions_scanned: 0,
            pages_skipped: 0,
        };

        info!(
            pid = query.pid,
            value_type = ?query.value_type,
            compare = ?query.compare,
            size,
            "scan start"
        );

        'regions: for region in regions.iter().filter(|r| r.is_readable()) {
            outcome.regions_scanned += 1;
            let len = region.len();
            let mut page_start = 0u64;
            // Offset of the next candidate, relative to the region start.
            let mut offset = 0u64;

            while page_start < len {
                if self.cancelled() {
                    outcome.cancelled = true;
                    break 'regions;
                }
                let page_end = (page_start + self.page_size as u64).min(len);
                let window_end = (page_end + size as u64 - 1).min(len);
                page.resize((window_end - page_start) as usize, 0);

                let address = region.start + page_start;
                let page_len = (page_end - page_start) as usize;
                let readable = match control.read_memory(query.pid, address, &mut page) {
                    Ok(()) => Some(page.len()),
                    // The straddle bytes may lie in the next, unreadable page.
                    Err(e) if page.len() > page_len => {
                        trace!(address = format_args!("{address:#x}"), error = %e, "window tail unreadable");
                        page.truncate(page_len);
                        control
                            .read_memory(query.pid, address, &mut page)
                            .map(|()| page_len)
                            .map_err(|e| {
                                trace!(address = format_args!("{address:#x}"), error = %e, "page unreadable");
                            })
                            .ok()
                    }
                    Err(e) => {
                        trace!(address = format_args!("{address:#x}"), error = %e, "page unreadable");
                        None
                    }
                };
                match readable {
                    Some(valid) => {
                        let valid_end = page_start + valid as u64;
                        while offset < page_end && offset + size as u64 <= valid_end {
                            let at = (offset - page_start) as usize;
                            if query.matches(&page[at..]) {
                                matches.push(region.start + offset)?;
                            }
                            offset += size as u64;
                        }
                    }
                    None => outcome.pages_skipped += 1,
                }
                while offset < page_end {
                    offset += size as u64;
                }
                page_start = page_end;
            }
            debug!(
                start = format_args!("{:#x}", region.start),
                end = format_args!("{:#x}", region.end),
                matches = matches.len(),
                "region scanned"
            );
        }

        info!(
            matches = matches.len(),
            cancelled = outcome.cancelled,
            "scan done"
        );
        outcome.matches = matches.into_vec();
        Ok(outcome)
    }
}
