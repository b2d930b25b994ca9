use core::fmt;

use serde::{Deserialize, Serialize};

use crate::address::{SheetId, SimpleCellAddress};

/// Sentinel coordinate for the unbounded side of an infinite range.
///
/// A whole-column range `A:A` is stored with `end.row == UNBOUNDED`; a
/// whole-row range `1:1` with `end.col == UNBOUNDED`.
pub const UNBOUNDED: u32 = u32::MAX;

/// A resolved rectangular range pinned to a sheet.
///
/// Always normalized: `start.col <= end.col` and `start.row <= end.row`.
/// Infinite column/row ranges are first-class and carry the [`UNBOUNDED`]
/// sentinel on the open side.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbsoluteCellRange {
    pub start: SimpleCellAddress,
    pub end: SimpleCellAddress,
}

impl AbsoluteCellRange {
    /// Construct a range, normalizing reversed corners.
    ///
    /// Both corners must live on the same sheet; the sheet of `a` wins (the
    /// parser rejects cross-sheet rectangles before this point).
    #[must_use]
    pub fn new(a: SimpleCellAddress, b: SimpleCellAddress) -> Self {
        let start = SimpleCellAddress {
            sheet: a.sheet,
            col: a.col.min(b.col),
            row: a.row.min(b.row),
        };
        let end = SimpleCellAddress {
            sheet: a.sheet,
            col: a.col.max(b.col),
            row: a.row.max(b.row),
        };
        Self { start, end }
    }

    /// A single-cell range.
    #[must_use]
    pub fn single(addr: SimpleCellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// A whole-column span `start_col:end_col`.
    #[must_use]
    pub fn whole_columns(sheet: SheetId, start_col: u32, end_col: u32) -> Self {
        Self {
            start: SimpleCellAddress::new(sheet, start_col.min(end_col), 0),
            end: SimpleCellAddress::new(sheet, start_col.max(end_col), UNBOUNDED),
        }
    }

    /// A whole-row span `start_row:end_row`.
    #[must_use]
    pub fn whole_rows(sheet: SheetId, start_row: u32, end_row: u32) -> Self {
        Self {
            start: SimpleCellAddress::new(sheet, 0, start_row.min(end_row)),
            end: SimpleCellAddress::new(sheet, UNBOUNDED, start_row.max(end_row)),
        }
    }

    #[must_use]
    pub const fn sheet(&self) -> SheetId {
        self.start.sheet
    }

    /// False when either side carries the [`UNBOUNDED`] sentinel.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.end.col != UNBOUNDED && self.end.row != UNBOUNDED
    }

    /// Number of columns. Meaningless for infinite row spans.
    #[must_use]
    pub const fn width(&self) -> u32 {
        if self.end.col == UNBOUNDED {
            UNBOUNDED
        } else {
            self.end.col - self.start.col + 1
        }
    }

    /// Number of rows. Meaningless for infinite column spans.
    #[must_use]
    pub const fn height(&self) -> u32 {
        if self.end.row == UNBOUNDED {
            UNBOUNDED
        } else {
            self.end.row - self.start.row + 1
        }
    }

    #[must_use]
    pub const fn is_single_cell(&self) -> bool {
        self.start.col == self.end.col && self.start.row == self.end.row && self.is_finite()
    }

    #[must_use]
    pub fn contains(&self, addr: SimpleCellAddress) -> bool {
        addr.sheet == self.sheet()
            && addr.col >= self.start.col
            && addr.col <= self.end.col
            && addr.row >= self.start.row
            && addr.row <= self.end.row
    }

    /// True when `other` lies entirely inside `self`.
    #[must_use]
    pub fn contains_range(&self, other: &AbsoluteCellRange) -> bool {
        other.sheet() == self.sheet()
            && other.start.col >= self.start.col
            && other.end.col <= self.end.col
            && other.start.row >= self.start.row
            && other.end.row <= self.end.row
    }

    /// Rectangle intersection; `None` when disjoint or on different sheets.
    #[must_use]
    pub fn intersect(&self, other: &AbsoluteCellRange) -> Option<AbsoluteCellRange> {
        if other.sheet() != self.sheet() {
            return None;
        }
        let start_col = self.start.col.max(other.start.col);
        let end_col = self.end.col.min(other.end.col);
        let start_row = self.start.row.max(other.start.row);
        let end_row = self.end.row.min(other.end.row);
        if start_col > end_col || start_row > end_row {
            return None;
        }
        Some(AbsoluteCellRange {
            start: SimpleCellAddress::new(self.sheet(), start_col, start_row),
            end: SimpleCellAddress::new(self.sheet(), end_col, end_row),
        })
    }

    /// True when the rectangles share at least one cell.
    #[must_use]
    pub fn overlaps(&self, other: &AbsoluteCellRange) -> bool {
        self.intersect(other).is_some()
    }

    /// Iterate addresses in row-major order.
    ///
    /// Callers must only iterate finite ranges; infinite ranges yield an
    /// empty iterator (their cells are connected through the infinite-range
    /// index instead).
    #[must_use]
    pub fn addresses(&self) -> RangeAddressIter {
        if !self.is_finite() {
            return RangeAddressIter {
                range: *self,
                next: None,
            };
        }
        RangeAddressIter {
            range: *self,
            next: Some(self.start),
        }
    }

    /// Total cell count for finite ranges.
    #[must_use]
    pub fn size(&self) -> usize {
        if !self.is_finite() {
            return 0;
        }
        self.width() as usize * self.height() as usize
    }

    /// The cells of `self` not covered by `inner`, in row-major order.
    ///
    /// Used when a range vertex shares a smaller sub-range: only the
    /// difference needs cell-level edges.
    #[must_use]
    pub fn addresses_outside(&self, inner: &AbsoluteCellRange) -> Vec<SimpleCellAddress> {
        self.addresses()
            .filter(|addr| !inner.contains(*addr))
            .collect()
    }
}

impl fmt::Display for AbsoluteCellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use crate::address::col_to_name;
        if self.end.row == UNBOUNDED {
            return write!(
                f,
                "{}:{}",
                col_to_name(self.start.col),
                col_to_name(self.end.col)
            );
        }
        if self.end.col == UNBOUNDED {
            return write!(f, "{}:{}", self.start.row + 1, self.end.row + 1);
        }
        if self.is_single_cell() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

/// Row-major iterator over the addresses of a finite range.
#[derive(Debug, Clone)]
pub struct RangeAddressIter {
    range: AbsoluteCellRange,
    next: Option<SimpleCellAddress>,
}

impl Iterator for RangeAddressIter {
    type Item = SimpleCellAddress;

    fn next(&mut self) -> Option<SimpleCellAddress> {
        let current = self.next?;
        self.next = if current.col < self.range.end.col {
            Some(SimpleCellAddress::new(
                current.sheet,
                current.col + 1,
                current.row,
            ))
        } else if current.row < self.range.end.row {
            Some(SimpleCellAddress::new(
                current.sheet,
                self.range.start.col,
                current.row + 1,
            ))
        } else {
            None
        };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(col: u32, row: u32) -> SimpleCellAddress {
        SimpleCellAddress::new(0, col, row)
    }

    #[test]
    fn reversed_corners_are_normalized() {
        let range = AbsoluteCellRange::new(addr(0, 1), addr(0, 0)); // A2:A1
        assert_eq!(range.start, addr(0, 0));
        assert_eq!(range.end, addr(0, 1));
    }

    #[test]
    fn row_major_iteration() {
        let range = AbsoluteCellRange::new(addr(0, 0), addr(1, 1));
        let cells: Vec<_> = range.addresses().collect();
        assert_eq!(cells, vec![addr(0, 0), addr(1, 0), addr(0, 1), addr(1, 1)]);
        assert_eq!(range.size(), 4);
    }

    #[test]
    fn containment_and_intersection() {
        let outer = AbsoluteCellRange::new(addr(0, 0), addr(3, 9));
        let inner = AbsoluteCellRange::new(addr(1, 2), addr(2, 4));
        assert!(outer.contains_range(&inner));
        assert!(!inner.contains_range(&outer));
        assert_eq!(outer.intersect(&inner), Some(inner));

        let disjoint = AbsoluteCellRange::new(addr(10, 10), addr(11, 11));
        assert_eq!(outer.intersect(&disjoint), None);

        let other_sheet = AbsoluteCellRange::new(
            SimpleCellAddress::new(1, 0, 0),
            SimpleCellAddress::new(1, 5, 5),
        );
        assert_eq!(outer.intersect(&other_sheet), None);
    }

    #[test]
    fn infinite_ranges_contain_any_row() {
        let col = AbsoluteCellRange::whole_columns(0, 0, 0);
        assert!(!col.is_finite());
        assert!(col.contains(addr(0, 1_000_000)));
        assert!(!col.contains(addr(1, 0)));
        assert_eq!(col.addresses().count(), 0);
        assert_eq!(col.to_string(), "A:A");

        let row = AbsoluteCellRange::whole_rows(0, 2, 2);
        assert!(row.contains(addr(500, 2)));
        assert_eq!(row.to_string(), "3:3");
    }

    #[test]
    fn addresses_outside_excludes_shared_subrange() {
        let outer = AbsoluteCellRange::new(addr(0, 0), addr(0, 9)); // A1:A10
        let inner = AbsoluteCellRange::new(addr(0, 0), addr(0, 4)); // A1:A5
        let rest = outer.addresses_outside(&inner);
        assert_eq!(rest.len(), 5);
        assert_eq!(rest[0], addr(0, 5));
        assert_eq!(rest[4], addr(0, 9));
    }
}
