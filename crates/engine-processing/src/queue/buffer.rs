use model::records::{destination::RawDestination, row::Row};
use std::collections::{BTreeMap, HashMap};

/// Rows waiting for upload to one destination, deduplicated by key.
#[derive(Debug, Default)]
struct PendingRows {
    rows: Vec<Row>,
    positions: HashMap<String, usize>,
}

impl PendingRows {
    /// A repeated key replaces the earlier row in place.
    fn push(&mut self, row: Row) -> bool {
        match self.positions.get(&row.key) {
            Some(&idx) => {
                self.rows[idx] = row;
                false
            }
            None => {
                self.positions.insert(row.key.clone(), self.rows.len());
                self.rows.push(row);
                true
            }
        }
    }
}

/// Per-destination staging area between `add` and the next flush.
#[derive(Debug, Default)]
pub(crate) struct RowBuffer {
    pending: BTreeMap<RawDestination, PendingRows>,
    len: usize,
    closed: bool,
}

impl RowBuffer {
    pub fn push(&mut self, destination: &RawDestination, row: Row) {
        if self.pending.entry(destination.clone()).or_default().push(row) {
            self.len += 1;
        }
    }

    /// Number of distinct rows buffered across all destinations.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn drain(&mut self) -> Vec<(RawDestination, Vec<Row>)> {
        self.len = 0;
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(destination, pending)| (destination, pending.rows))
            .collect()
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
