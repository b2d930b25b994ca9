//! Named expressions: two-level scoping (workbook-wide and per-sheet) over
//! a virtual sheet of the dependency graph.
//!
//! Each name is allocated a consecutive row of the reserved sheet
//! ([`SHEET_FOR_WORKBOOK_EXPRESSIONS`]), so the graph can treat a named
//! expression exactly like a cell: formulas that reference it get an edge to
//! that address, and redefining the name is an ordinary cell write.

use std::collections::HashMap;

use riskgrid_model::{SheetId, SimpleCellAddress, SHEET_FOR_WORKBOOK_EXPRESSIONS};

/// One stored name.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedExpressionEntry {
    /// Normalised (lowercased) name.
    pub name: String,
    /// Display-cased name as the user wrote it.
    pub display_name: String,
    /// Cell backing this name on the virtual sheet.
    pub address: SimpleCellAddress,
    /// False while the name is only referenced, not yet defined; the backing
    /// cell is then an `Empty` placeholder and reads as `#NAME?`.
    pub added: bool,
}

/// Workbook- and sheet-scoped name stores.
#[derive(Debug, Default)]
pub struct NamedExpressions {
    /// Normalised name -> entry, workbook scope.
    workbook: HashMap<String, NamedExpressionEntry>,
    /// (sheet, normalised name) -> entry.
    sheet_scoped: HashMap<(SheetId, String), NamedExpressionEntry>,
    next_row: u32,
}

impl NamedExpressions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercase normalisation; lookups and storage are case-insensitive.
    #[must_use]
    pub fn normalise(name: &str) -> String {
        name.to_lowercase()
    }

    /// Names must start with a letter or underscore, continue with Unicode
    /// letters, digits, underscores or periods, and must not look like an
    /// A1 or R1C1 reference.
    #[must_use]
    pub fn is_valid_name(name: &str) -> bool {
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        if !(first.is_alphabetic() || first == '_') {
            return false;
        }
        if !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            return false;
        }
        !looks_like_a1(name) && !looks_like_r1c1(name)
    }

    /// Define (or redefine) a name, allocating its backing cell on first
    /// use. Returns the backing address.
    pub fn define(&mut self, name: &str, scope: Option<SheetId>) -> SimpleCellAddress {
        let normalised = Self::normalise(name);
        let next_row = &mut self.next_row;
        let entry = match scope {
            None => self
                .workbook
                .entry(normalised.clone())
                .or_insert_with(|| new_entry(name, &normalised, next_row)),
            Some(sheet) => self
                .sheet_scoped
                .entry((sheet, normalised.clone()))
                .or_insert_with(|| new_entry(name, &normalised, next_row)),
        };
        entry.added = true;
        entry.display_name = name.to_string();
        entry.address
    }

    /// Ensure a workbook-scope placeholder exists for a referenced name, so
    /// formulas can take an edge to it before it is defined.
    pub fn ensure_placeholder(&mut self, name: &str) -> SimpleCellAddress {
        let normalised = Self::normalise(name);
        let next_row = &mut self.next_row;
        self.workbook
            .entry(normalised.clone())
            .or_insert_with(|| new_entry(name, &normalised, next_row))
            .address
    }

    /// Resolve a name from a sheet's point of view: sheet scope first, then
    /// workbook scope. Placeholders resolve too (their cells read as empty
    /// until defined).
    #[must_use]
    pub fn resolve(&self, name: &str, sheet: SheetId) -> Option<&NamedExpressionEntry> {
        let normalised = Self::normalise(name);
        self.sheet_scoped
            .get(&(sheet, normalised.clone()))
            .or_else(|| self.workbook.get(&normalised))
    }

    /// Whether the name has actually been defined (not just referenced).
    #[must_use]
    pub fn is_defined(&self, name: &str, sheet: SheetId) -> bool {
        self.resolve(name, sheet).is_some_and(|e| e.added)
    }

    /// Remove a definition. The backing cell keeps existing while referenced;
    /// the entry reverts to a placeholder.
    pub fn remove(&mut self, name: &str, scope: Option<SheetId>) -> Option<SimpleCellAddress> {
        let normalised = Self::normalise(name);
        match scope {
            None => self.workbook.get_mut(&normalised).map(|e| {
                e.added = false;
                e.address
            }),
            Some(sheet) => self.sheet_scoped.get_mut(&(sheet, normalised)).map(|e| {
                e.added = false;
                e.address
            }),
        }
    }

    /// Reverse lookup of the name backed by a virtual-sheet address.
    #[must_use]
    pub fn name_by_address(&self, addr: SimpleCellAddress) -> Option<&str> {
        self.workbook
            .values()
            .chain(self.sheet_scoped.values())
            .find(|e| e.address == addr)
            .map(|e| e.display_name.as_str())
    }

    /// All defined names, for serialization.
    pub fn iter_defined(&self) -> impl Iterator<Item = &NamedExpressionEntry> {
        self.workbook
            .values()
            .chain(self.sheet_scoped.values())
            .filter(|e| e.added)
    }
}

fn new_entry(display: &str, normalised: &str, next_row: &mut u32) -> NamedExpressionEntry {
    let address = SimpleCellAddress::new(SHEET_FOR_WORKBOOK_EXPRESSIONS, 0, *next_row);
    *next_row += 1;
    NamedExpressionEntry {
        name: normalised.to_string(),
        display_name: display.to_string(),
        address,
        added: false,
    }
}

fn looks_like_a1(name: &str) -> bool {
    let bytes = name.as_bytes();
    let letters = bytes.iter().take_while(|b| b.is_ascii_alphabetic()).count();
    if letters == 0 || letters == bytes.len() {
        return false;
    }
    bytes[letters..].iter().all(u8::is_ascii_digit)
}

fn looks_like_r1c1(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || !matches!(bytes[0], b'r' | b'R') {
        return false;
    }
    let mut idx = 1;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx >= bytes.len() || !matches!(bytes[idx], b'c' | b'C') {
        return false;
    }
    idx += 1;
    bytes[idx..].iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validity() {
        assert!(NamedExpressions::is_valid_name("tax_rate"));
        assert!(NamedExpressions::is_valid_name("_hidden"));
        assert!(NamedExpressions::is_valid_name("rate.2024"));
        assert!(!NamedExpressions::is_valid_name("2024rate"));
        assert!(!NamedExpressions::is_valid_name("A1"));
        assert!(!NamedExpressions::is_valid_name("XFD1048576"));
        assert!(!NamedExpressions::is_valid_name("R1C1"));
        assert!(!NamedExpressions::is_valid_name("rc"));
        assert!(!NamedExpressions::is_valid_name(""));
    }

    #[test]
    fn names_live_on_the_virtual_sheet_in_consecutive_rows() {
        let mut names = NamedExpressions::new();
        let a = names.define("alpha", None);
        let b = names.define("beta", None);
        assert_eq!(a.sheet, SHEET_FOR_WORKBOOK_EXPRESSIONS);
        assert_eq!((a.row, b.row), (0, 1));

        // Redefinition reuses the backing cell.
        assert_eq!(names.define("Alpha", None), a);
    }

    #[test]
    fn sheet_scope_shadows_workbook_scope() {
        let mut names = NamedExpressions::new();
        let wb = names.define("rate", None);
        let sheet = names.define("rate", Some(2));
        assert_ne!(wb, sheet);
        assert_eq!(names.resolve("rate", 2).unwrap().address, sheet);
        assert_eq!(names.resolve("rate", 0).unwrap().address, wb);
    }

    #[test]
    fn placeholders_are_not_defined() {
        let mut names = NamedExpressions::new();
        let addr = names.ensure_placeholder("future");
        assert!(!names.is_defined("future", 0));
        assert_eq!(names.resolve("future", 0).unwrap().address, addr);

        names.define("future", None);
        assert!(names.is_defined("future", 0));
    }
}
