//! Per-object record of expected cells and how each fetch ended.
//!
//! An object is only considered provisioned when its manifest matches a
//! fresh cone computation and every stored tile is still on disk; metadata
//! alone is not enough.

use std::collections::HashSet;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::domain::TileCell;
use crate::fetch::FetchOutcome;
use crate::tiles::TileAddressing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellOutcome {
    Fetched,
    Present,
    /// Survey returned not-found; resolved, but no file.
    Missing,
    Failed,
}

impl From<&FetchOutcome> for CellOutcome {
    fn from(value: &FetchOutcome) -> Self {
        match value {
            FetchOutcome::Fetched { .. } => CellOutcome::Fetched,
            FetchOutcome::AlreadyPresent => CellOutcome::Present,
            FetchOutcome::NotFound => CellOutcome::Missing,
            FetchOutcome::TransientFailure { .. } => CellOutcome::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRecord {
    pub index: u64,
    pub outcome: CellOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderManifest {
    pub order: u8,
    pub cells: Vec<CellRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectManifest {
    pub id: String,
    pub max_order: u8,
    pub tool: String,
    pub provisioned_at: String,
    pub orders: Vec<OrderManifest>,
}

/// Per-outcome tile counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TileTally {
    pub fetched: usize,
    pub present: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl TileTally {
    pub fn record(&mut self, outcome: CellOutcome) {
        match outcome {
            CellOutcome::Fetched => self.fetched += 1,
            CellOutcome::Present => self.present += 1,
            CellOutcome::Missing => self.not_found += 1,
            CellOutcome::Failed => self.failed += 1,
        }
    }

    /// Tiles available locally.
    pub fn stored(&self) -> usize {
        self.fetched + self.present
    }

    pub fn total(&self) -> usize {
        self.fetched + self.present + self.not_found + self.failed
    }

    pub fn add(&mut self, other: &TileTally) {
        self.fetched += other.fetched;
        self.present += other.present;
        self.not_found += other.not_found;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    /// Recorded for another max order or cone; the object must be redone.
    Stale,
    Incomplete { failed: usize, lost: usize },
}

impl ObjectManifest {
    /// Whether this manifest was written for the same orders and cells.
    pub fn matches(&self, max_order: u8, expected: &[Vec<u64>]) -> bool {
        self.max_order == max_order
            && self.orders.len() == expected.len()
            && self
                .orders
                .iter()
                .zip(expected)
                .enumerate()
                .all(|(order, (recorded, cells))| {
                    recorded.order as usize == order
                        && recorded.cells.len() == cells.len()
                        && recorded
                            .cells
                            .iter()
                            .zip(cells)
                            .all(|(cell, index)| cell.index == *index)
                })
    }

    /// Cells the survey answered not-found for, if the manifest still
    /// matches the expected coverage.
    pub fn missing_cells(&self, max_order: u8, expected: &[Vec<u64>]) -> HashSet<TileCell> {
        if !self.matches(max_order, expected) {
            return HashSet::new();
        }
        self.orders
            .iter()
            .flat_map(|order| {
                order
                    .cells
                    .iter()
                    .filter(|cell| cell.outcome == CellOutcome::Missing)
                    .map(move |cell| TileCell::new(order.order, cell.index))
            })
            .collect()
    }

    pub fn tally(&self) -> TileTally {
        let mut tally = TileTally::default();
        for cell in self.orders.iter().flat_map(|order| &order.cells) {
            tally.record(cell.outcome);
        }
        tally
    }

    /// Compare against freshly computed coverage (`expected[o]` lists the
    /// cells of order `o`) and the files under `object_dir`.
    pub fn check(
        &self,
        max_order: u8,
        expected: &[Vec<u64>],
        object_dir: &Utf8Path,
        addressing: &TileAddressing,
    ) -> Completeness {
        if !self.matches(max_order, expected) {
            return Completeness::Stale;
        }
        let mut failed = 0;
        let mut lost = 0;
        for recorded in &self.orders {
            for cell in &recorded.cells {
                match cell.outcome {
                    CellOutcome::Failed => failed += 1,
                    CellOutcome::Missing => {}
                    CellOutcome::Fetched | CellOutcome::Present => {
                        let path = addressing
                            .local_path(object_dir, TileCell::new(recorded.order, cell.index));
                        if !path.as_std_path().exists() {
                            lost += 1;
                        }
                    }
                }
            }
        }
        if failed == 0 && lost == 0 {
            Completeness::Complete
        } else {
            Completeness::Incomplete { failed, lost }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_each_outcome() {
        let manifest = ObjectManifest {
            id: "m1".to_string(),
            max_order: 0,
            tool: "test".to_string(),
            provisioned_at: "2026-01-01T00:00:00Z".to_string(),
            orders: vec![OrderManifest {
                order: 0,
                cells: vec![
                    CellRecord { index: 1, outcome: CellOutcome::Fetched },
                    CellRecord { index: 2, outcome: CellOutcome::Missing },
                    CellRecord { index: 3, outcome: CellOutcome::Failed },
                ],
            }],
        };
        let tally = manifest.tally();
        assert_eq!(tally.stored(), 1);
        assert_eq!(tally.not_found, 1);
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn missing_cells_require_matching_coverage() {
        let manifest = ObjectManifest {
            id: "m1".to_string(),
            max_order: 1,
            tool: "test".to_string(),
            provisioned_at: "2026-01-01T00:00:00Z".to_string(),
            orders: vec![
                OrderManifest {
                    order: 0,
                    cells: vec![CellRecord { index: 4, outcome: CellOutcome::Fetched }],
                },
                OrderManifest {
                    order: 1,
                    cells: vec![
                        CellRecord { index: 16, outcome: CellOutcome::Missing },
                        CellRecord { index: 17, outcome: CellOutcome::Failed },
                    ],
                },
            ],
        };
        let expected = vec![vec![4], vec![16, 17]];
        let missing = manifest.missing_cells(1, &expected);
        assert_eq!(missing.len(), 1);
        assert!(missing.contains(&TileCell::new(1, 16)));

        assert!(manifest.missing_cells(2, &expected).is_empty());
        assert!(manifest.missing_cells(1, &[vec![4], vec![16, 18]]).is_empty());
    }

    #[test]
    fn outcome_serializes_lowercase() {
        let json = serde_json::to_string(&CellOutcome::Missing).unwrap();
        assert_eq!(json, "\"missing\"");
    }
}
