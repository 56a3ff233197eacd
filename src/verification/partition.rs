// ABOUTME: Splits a schema's tables into work units for the checksum workers
// ABOUTME: Orders tables by estimated size, then cuts contiguous equal-size slices

use super::TableDescriptor;
use std::num::NonZeroUsize;
use std::ops::Range;

/// A contiguous slice `[start, end)` of the sorted table list owned by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkUnit {
    pub start: usize,
    pub end: usize,
}

impl WorkUnit {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Stable ascending sort by approximate row count
///
/// Tables with equal estimates keep their catalog order.
pub fn sort_by_row_count(tables: &mut [TableDescriptor]) {
    tables.sort_by_key(|table| table.approximate_row_count);
}

/// Sort `tables` in place and divide them into `workers` work units
///
/// Every unit but the last holds `len / workers` tables; the last one also
/// takes the remainder. With more workers than tables the leading units are
/// empty.
pub fn partition(tables: &mut [TableDescriptor], workers: NonZeroUsize) -> Vec<WorkUnit> {
    sort_by_row_count(tables);
    split_ranges(tables.len(), workers)
}

fn split_ranges(count: usize, workers: NonZeroUsize) -> Vec<WorkUnit> {
    let workers = workers.get();
    let chunk = count / workers;

    (0..workers)
        .map(|i| {
            let start = i * chunk;
            let end = if i == workers - 1 { count } else { start + chunk };
            WorkUnit { start, end }
        })
        .collect()
}
