//! Dependency extraction: walk an AST and list everything it reads, in the
//! position-independent form the cache stores, plus the absolutisation step
//! that resolves those against a concrete formula address.

use riskgrid_model::{AbsoluteCellRange, CellAddress, SimpleCellAddress};

use super::ast::{Ast, ColumnAddress, RowAddress};

/// A single dependency of a formula, relative to its owning address.
#[derive(Clone, Debug, PartialEq)]
pub enum Dep {
    Address(CellAddress),
    CellRange {
        start: CellAddress,
        end: CellAddress,
    },
    ColumnRange {
        start: ColumnAddress,
        end: ColumnAddress,
    },
    RowRange {
        start: RowAddress,
        end: RowAddress,
    },
    Name(String),
}

/// A dependency resolved against a formula address, usable by the graph.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedDep {
    Cell(SimpleCellAddress),
    Range(AbsoluteCellRange),
    Name(String),
}

/// Collect the dependencies of an AST in source order.
#[must_use]
pub fn collect_dependencies(ast: &Ast) -> Vec<Dep> {
    let mut deps = Vec::new();
    ast.visit(&mut |node| match node {
        Ast::CellReference(addr) => deps.push(Dep::Address(*addr)),
        Ast::CellRange { start, end } => deps.push(Dep::CellRange {
            start: *start,
            end: *end,
        }),
        Ast::ColumnRange { start, end } => deps.push(Dep::ColumnRange {
            start: *start,
            end: *end,
        }),
        Ast::RowRange { start, end } => deps.push(Dep::RowRange {
            start: *start,
            end: *end,
        }),
        Ast::NamedExpression(name) => deps.push(Dep::Name(name.to_lowercase())),
        _ => {}
    });
    deps
}

/// Resolve a relative dependency against the owning formula's address.
///
/// Returns `None` when a relative offset escapes the sheet (the evaluator
/// reports such references as `#REF!`; the graph simply has no edge to add).
#[must_use]
pub fn absolutize(dep: &Dep, base: SimpleCellAddress) -> Option<ResolvedDep> {
    match dep {
        Dep::Address(addr) => addr.resolve(base).map(ResolvedDep::Cell),
        Dep::CellRange { start, end } => {
            let start = start.resolve(base)?;
            let end = end.resolve(base)?;
            if start.sheet != end.sheet {
                return None;
            }
            Some(ResolvedDep::Range(AbsoluteCellRange::new(start, end)))
        }
        Dep::ColumnRange { start, end } => {
            let sheet = start.sheet.resolve(base.sheet);
            let start_col = start.col.resolve(base.col)?;
            let end_col = end.col.resolve(base.col)?;
            Some(ResolvedDep::Range(AbsoluteCellRange::whole_columns(
                sheet, start_col, end_col,
            )))
        }
        Dep::RowRange { start, end } => {
            let sheet = start.sheet.resolve(base.sheet);
            let start_row = start.row.resolve(base.row)?;
            let end_row = end.row.resolve(base.row)?;
            Some(ResolvedDep::Range(AbsoluteCellRange::whole_rows(
                sheet, start_row, end_row,
            )))
        }
        Dep::Name(name) => Some(ResolvedDep::Name(name.clone())),
    }
}
