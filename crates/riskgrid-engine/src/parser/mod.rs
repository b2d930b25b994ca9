//! Formula lexer and parser.
//!
//! Parsing produces a position-independent [`Ast`] (cell references are
//! stored as offsets from the owning formula) plus the canonical hash that
//! keys the AST cache, so structurally identical formulas at different
//! addresses share one parsed tree.

use riskgrid_model::{CellAddress, CellCoord, ErrorKind, SheetId, SheetSlot, SimpleCellAddress};
use thiserror::Error;

mod ast;
pub mod cache;
pub mod deps;
pub mod hash;
mod lexer;

pub use ast::{Ast, BinaryOp, ColumnAddress, DistributionLiteral, RowAddress, UnaryOp};
pub use cache::{CacheEntry, ParserCache};
pub use deps::{absolutize, collect_dependencies, Dep, ResolvedDep};
pub use hash::hash_ast;
pub use lexer::{lex, CellToken, R1C1Token, Token, TokenKind, MAX_FORMULA_CHARS};

/// Which phase rejected the formula text.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParsingErrorKind {
    LexingError,
    ParsingError,
}

/// A lex or parse failure, retained verbatim in parsing-error vertices.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ParsingError {
    pub kind: ParsingErrorKind,
    pub message: String,
}

impl ParsingError {
    fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: ParsingErrorKind::ParsingError,
            message: message.into(),
        }
    }
}

/// Resolution of sheet names to ids during parsing.
pub trait SheetIndex {
    fn sheet_id_by_name(&self, name: &str) -> Option<SheetId>;
}

/// A successfully parsed formula: the relative AST and its canonical hash.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedFormula {
    pub ast: Ast,
    pub hash: String,
}

/// Parse a formula (with or without its leading `=`) against the address it
/// lives at.
pub fn parse_formula(
    text: &str,
    base: SimpleCellAddress,
    sheets: &dyn SheetIndex,
    config: &crate::config::Config,
) -> Result<ParsedFormula, Vec<ParsingError>> {
    let body = text.strip_prefix('=').unwrap_or(text);
    let tokens = lex(body, config).map_err(|e| vec![e])?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        base,
        sheets,
        config,
    };
    let ast = parser.parse_expression(0).map_err(|e| vec![e])?;
    parser.expect_eof().map_err(|e| vec![e])?;
    let hash = hash_ast(&ast, config);
    Ok(ParsedFormula { ast, hash })
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    base: SimpleCellAddress,
    sheets: &'a dyn SheetIndex,
    config: &'a crate::config::Config,
}

// Binding powers, loosest to tightest. Left-associative operators use
// `(l, l + 1)`; unary minus binds tighter than `^` so `-2^2 = 4`.
const BP_COMPARE: (u8, u8) = (1, 2);
const BP_CONCAT: (u8, u8) = (3, 4);
const BP_ADDITIVE: (u8, u8) = (5, 6);
const BP_MULTIPLICATIVE: (u8, u8) = (7, 8);
const BP_POW: (u8, u8) = (9, 10);
const BP_UNARY: u8 = 11;
const BP_PERCENT: u8 = 13;

impl<'a> Parser<'a> {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos.min(self.tokens.len() - 1)].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), ParsingError> {
        if self.peek() == kind {
            self.advance();
            Ok(())
        } else {
            Err(ParsingError::parse(format!(
                "expected {what}, got {:?}",
                self.peek()
            )))
        }
    }

    fn expect_eof(&mut self) -> Result<(), ParsingError> {
        match self.peek() {
            TokenKind::Eof => Ok(()),
            other => Err(ParsingError::parse(format!(
                "unexpected trailing token {other:?}"
            ))),
        }
    }

    fn parse_expression(&mut self, min_bp: u8) -> Result<Ast, ParsingError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let op = match self.peek() {
                TokenKind::Percent => {
                    if BP_PERCENT < min_bp {
                        break;
                    }
                    self.advance();
                    lhs = Ast::Unary {
                        op: UnaryOp::Percent,
                        expr: Box::new(lhs),
                    };
                    continue;
                }
                TokenKind::Eq => (BinaryOp::Eq, BP_COMPARE),
                TokenKind::Ne => (BinaryOp::Ne, BP_COMPARE),
                TokenKind::Lt => (BinaryOp::Lt, BP_COMPARE),
                TokenKind::Le => (BinaryOp::Le, BP_COMPARE),
                TokenKind::Gt => (BinaryOp::Gt, BP_COMPARE),
                TokenKind::Ge => (BinaryOp::Ge, BP_COMPARE),
                TokenKind::Amp => (BinaryOp::Concat, BP_CONCAT),
                TokenKind::Plus => (BinaryOp::Add, BP_ADDITIVE),
                TokenKind::Minus => (BinaryOp::Sub, BP_ADDITIVE),
                TokenKind::Star => (BinaryOp::Mul, BP_MULTIPLICATIVE),
                TokenKind::Slash => (BinaryOp::Div, BP_MULTIPLICATIVE),
                TokenKind::Caret => (BinaryOp::Pow, BP_POW),
                _ => break,
            };

            let (op, (l_bp, r_bp)) = op;
            if l_bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_expression(r_bp)?;
            lhs = Ast::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Ast, ParsingError> {
        match self.peek().clone() {
            TokenKind::Plus => {
                self.advance();
                Ok(Ast::Unary {
                    op: UnaryOp::Plus,
                    expr: Box::new(self.parse_expression(BP_UNARY)?),
                })
            }
            TokenKind::Minus => {
                self.advance();
                Ok(Ast::Unary {
                    op: UnaryOp::Minus,
                    expr: Box::new(self.parse_expression(BP_UNARY)?),
                })
            }
            TokenKind::Number(n) => {
                self.advance();
                // `1:3` is a whole-row range when both sides are row indices.
                if *self.peek() == TokenKind::Colon {
                    if let TokenKind::Number(end) = *self.peek_at(1) {
                        if let Some(range) = self.try_row_range(n, end) {
                            self.advance(); // ':'
                            self.advance(); // end number
                            return Ok(range);
                        }
                    }
                }
                Ok(Ast::Number(n))
            }
            TokenKind::Text(s) => {
                self.advance();
                Ok(Ast::Text(s))
            }
            TokenKind::Error(kind) => {
                self.advance();
                Ok(Ast::Error(kind))
            }
            TokenKind::Distribution(literal) => {
                self.advance();
                Ok(Ast::Distribution(literal))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression(0)?;
                self.expect(&TokenKind::RParen, "`)`")?;
                Ok(Ast::Parenthesis(Box::new(inner)))
            }
            TokenKind::LBrace => self.parse_array_literal(),
            TokenKind::Cell(token) => {
                self.advance();
                self.parse_reference_from_cell(SheetSlot::Current, token)
            }
            TokenKind::R1C1(token) => {
                self.advance();
                Ok(Ast::CellReference(CellAddress {
                    sheet: SheetSlot::Current,
                    col: r1c1_coord(token.col_abs, token.col_offset),
                    row: r1c1_coord(token.row_abs, token.row_offset),
                }))
            }
            TokenKind::QuotedIdent(name) => {
                self.advance();
                self.parse_sheet_prefixed(&name)
            }
            TokenKind::Ident(name) => {
                self.advance();
                self.parse_ident(name)
            }
            other => Err(ParsingError::parse(format!(
                "unexpected token {other:?}"
            ))),
        }
    }

    /// `{1, 2; 3, 4}` — the argument separator splits columns, `;` (or `|`)
    /// splits rows.
    fn parse_array_literal(&mut self) -> Result<Ast, ParsingError> {
        self.expect(&TokenKind::LBrace, "`{`")?;
        let mut rows: Vec<Vec<Ast>> = Vec::new();
        let mut current: Vec<Ast> = Vec::new();
        loop {
            current.push(self.parse_expression(0)?);
            match self.peek() {
                TokenKind::ArgSep => {
                    self.advance();
                }
                TokenKind::RowSep => {
                    self.advance();
                    rows.push(std::mem::take(&mut current));
                }
                TokenKind::RBrace => {
                    self.advance();
                    rows.push(current);
                    break;
                }
                other => {
                    return Err(ParsingError::parse(format!(
                        "unexpected token {other:?} in array literal"
                    )));
                }
            }
        }
        let width = rows[0].len();
        if rows.iter().any(|row| row.len() != width) {
            return Err(ParsingError::parse("ragged array literal"));
        }
        Ok(Ast::ArrayLiteral(rows))
    }

    /// An identifier can open a function call, a column range, a boolean
    /// literal, a sheet-prefixed reference, or a named expression.
    fn parse_ident(&mut self, name: String) -> Result<Ast, ParsingError> {
        if *self.peek() == TokenKind::LParen {
            return self.parse_function_call(&name);
        }
        if *self.peek() == TokenKind::Bang {
            self.advance();
            return self.parse_sheet_suffix(&name);
        }
        if *self.peek() == TokenKind::Colon {
            if let Some(range) = self.try_column_range(&name)? {
                return Ok(range);
            }
            if let Some(range) = self.try_row_range_from_ident(&name)? {
                return Ok(range);
            }
        }
        if name.eq_ignore_ascii_case("TRUE") {
            return Ok(Ast::Bool(true));
        }
        if name.eq_ignore_ascii_case("FALSE") {
            return Ok(Ast::Bool(false));
        }
        Ok(Ast::NamedExpression(name))
    }

    fn parse_sheet_prefixed(&mut self, name: &str) -> Result<Ast, ParsingError> {
        self.expect(&TokenKind::Bang, "`!` after sheet name")?;
        self.parse_sheet_suffix(name)
    }

    fn parse_sheet_suffix(&mut self, sheet_name: &str) -> Result<Ast, ParsingError> {
        let Some(sheet_id) = self.sheets.sheet_id_by_name(sheet_name) else {
            // Unknown sheet: consume the reference, evaluate to #REF!.
            self.skip_reference_tokens();
            return Ok(Ast::Error(ErrorKind::Ref));
        };
        let slot = SheetSlot::Sheet(sheet_id);
        match self.advance() {
            TokenKind::Cell(token) => self.parse_reference_from_cell(slot, token),
            TokenKind::Ident(name) => {
                if *self.peek() == TokenKind::Colon {
                    if let Some(range) = self.try_column_range_on(slot, &name)? {
                        return Ok(range);
                    }
                }
                Err(ParsingError::parse(format!(
                    "expected reference after sheet name, got `{name}`"
                )))
            }
            other => Err(ParsingError::parse(format!(
                "expected reference after sheet name, got {other:?}"
            ))),
        }
    }

    fn skip_reference_tokens(&mut self) {
        loop {
            match self.peek() {
                TokenKind::Cell(_) | TokenKind::R1C1(_) | TokenKind::Ident(_) => {
                    self.advance();
                }
                TokenKind::Colon => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn parse_function_call(&mut self, written_name: &str) -> Result<Ast, ParsingError> {
        self.expect(&TokenKind::LParen, "`(`")?;
        let name = self.config.translation.canonical_function_name(written_name);
        let mut args: Vec<Ast> = Vec::new();

        if *self.peek() == TokenKind::RParen {
            self.advance();
            return Ok(Ast::FunctionCall { name, args });
        }

        loop {
            // A separator (or the closing paren) directly after the previous
            // separator is a missing argument.
            if matches!(self.peek(), TokenKind::ArgSep | TokenKind::RParen) {
                args.push(Ast::Empty);
            } else {
                args.push(self.parse_expression(0)?);
            }
            match self.advance() {
                TokenKind::ArgSep => continue,
                TokenKind::RParen => break,
                other => {
                    return Err(ParsingError::parse(format!(
                        "expected argument separator or `)`, got {other:?}"
                    )));
                }
            }
        }

        Ok(Ast::FunctionCall { name, args })
    }

    fn parse_reference_from_cell(
        &mut self,
        sheet: SheetSlot,
        start_token: CellToken,
    ) -> Result<Ast, ParsingError> {
        let start = self.cell_address(sheet, start_token);
        if *self.peek() != TokenKind::Colon {
            return Ok(Ast::CellReference(start));
        }
        // Peek past the colon: only a cell continues a rectangle.
        if let TokenKind::Cell(end_token) = *self.peek_at(1) {
            self.advance(); // ':'
            self.advance(); // end cell
            let end = self.cell_address(sheet, end_token);
            return Ok(normalized_cell_range(start, end, self.base));
        }
        Ok(Ast::CellReference(start))
    }

    fn cell_address(&self, sheet: SheetSlot, token: CellToken) -> CellAddress {
        CellAddress {
            sheet,
            col: if token.col_abs {
                CellCoord::Absolute(token.col)
            } else {
                CellCoord::Relative(i64::from(token.col) - i64::from(self.base.col))
            },
            row: if token.row_abs {
                CellCoord::Absolute(token.row)
            } else {
                CellCoord::Relative(i64::from(token.row) - i64::from(self.base.row))
            },
        }
    }

    /// `A:C` or `$A:$C`, where both sides lex as identifiers.
    fn try_column_range(&mut self, name: &str) -> Result<Option<Ast>, ParsingError> {
        self.try_column_range_on(SheetSlot::Current, name)
    }

    fn try_column_range_on(
        &mut self,
        sheet: SheetSlot,
        name: &str,
    ) -> Result<Option<Ast>, ParsingError> {
        let Some(start) = parse_column_ident(name) else {
            return Ok(None);
        };
        let TokenKind::Ident(end_name) = self.peek_at(1).clone() else {
            return Ok(None);
        };
        let Some(end) = parse_column_ident(&end_name) else {
            return Ok(None);
        };
        self.advance(); // ':'
        self.advance(); // end ident

        let to_coord = |(col, abs): (u32, bool)| {
            if abs {
                CellCoord::Absolute(col)
            } else {
                CellCoord::Relative(i64::from(col) - i64::from(self.base.col))
            }
        };
        Ok(Some(Ast::ColumnRange {
            start: ColumnAddress {
                sheet,
                col: to_coord(start),
            },
            end: ColumnAddress {
                sheet,
                col: to_coord(end),
            },
        }))
    }

    /// `$1:$3` — absolute row ranges arrive as `$`-prefixed identifiers.
    fn try_row_range_from_ident(&mut self, name: &str) -> Result<Option<Ast>, ParsingError> {
        let Some(start) = parse_row_ident(name) else {
            return Ok(None);
        };
        let end = match self.peek_at(1).clone() {
            TokenKind::Ident(end_name) => match parse_row_ident(&end_name) {
                Some(end) => end,
                None => return Ok(None),
            },
            TokenKind::Number(n) => match row_index(n) {
                Some(row) => (row, false),
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        self.advance(); // ':'
        self.advance(); // end token

        Ok(Some(self.row_range(start, end)))
    }

    fn try_row_range(&self, start: f64, end: f64) -> Option<Ast> {
        let start = row_index(start)?;
        let end = row_index(end)?;
        Some(self.row_range((start, false), (end, false)))
    }

    fn row_range(&self, start: (u32, bool), end: (u32, bool)) -> Ast {
        let to_coord = |(row, abs): (u32, bool)| {
            if abs {
                CellCoord::Absolute(row)
            } else {
                CellCoord::Relative(i64::from(row) - i64::from(self.base.row))
            }
        };
        Ast::RowRange {
            start: RowAddress {
                sheet: SheetSlot::Current,
                row: to_coord(start),
            },
            end: RowAddress {
                sheet: SheetSlot::Current,
                row: to_coord(end),
            },
        }
    }
}

/// `A` or `$A` as a column identifier: `(0-indexed column, absolute)`.
fn parse_column_ident(name: &str) -> Option<(u32, bool)> {
    let (abs, letters) = match name.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, name),
    };
    if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    if letters.len() > 3 {
        return None;
    }
    riskgrid_model::name_to_col(letters).ok().map(|c| (c, abs))
}

/// `$3` as a row identifier: `(0-indexed row, absolute)`.
fn parse_row_ident(name: &str) -> Option<(u32, bool)> {
    let rest = name.strip_prefix('$')?;
    let row_1_based: u32 = rest.parse().ok()?;
    if row_1_based == 0 {
        return None;
    }
    Some((row_1_based - 1, true))
}

fn row_index(n: f64) -> Option<u32> {
    if n.fract() != 0.0 || n < 1.0 || n > f64::from(u32::MAX) {
        return None;
    }
    Some(n as u32 - 1)
}

fn r1c1_coord(abs: Option<u32>, offset: i64) -> CellCoord {
    match abs {
        Some(index) => CellCoord::Absolute(index),
        None => CellCoord::Relative(offset),
    }
}

/// Reorder reversed range corners so `A2:A1` normalises to `A1:A2`.
///
/// Corners are compared in resolved coordinates (column, then row); mixed
/// absolute/relative corners that cannot be resolved keep their order.
fn normalized_cell_range(start: CellAddress, end: CellAddress, base: SimpleCellAddress) -> Ast {
    let (Some(s), Some(e)) = (start.resolve(base), end.resolve(base)) else {
        return Ast::CellRange { start, end };
    };
    let reversed = (e.col, e.row, e.sheet) < (s.col, s.row, s.sheet);
    if reversed {
        Ast::CellRange {
            start: end,
            end: start,
        }
    } else {
        Ast::CellRange { start, end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    struct NoSheets;
    impl SheetIndex for NoSheets {
        fn sheet_id_by_name(&self, name: &str) -> Option<SheetId> {
            (name == "Sheet2").then_some(1)
        }
    }

    fn parse(text: &str) -> Ast {
        let base = SimpleCellAddress::new(0, 1, 1); // B2
        parse_formula(text, base, &NoSheets, &Config::default())
            .unwrap()
            .ast
    }

    #[test]
    fn precedence_and_associativity() {
        // 1+2*3 parses as 1+(2*3).
        let ast = parse("=1+2*3");
        match ast {
            Ast::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => {
                assert!(matches!(
                    *right,
                    Ast::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn unary_minus_binds_tighter_than_pow() {
        // -2^2 parses as (-2)^2.
        let ast = parse("=-2^2");
        assert!(matches!(
            ast,
            Ast::Binary {
                op: BinaryOp::Pow,
                ..
            }
        ));
    }

    #[test]
    fn relative_references_are_offsets_from_base() {
        // A1 seen from B2 is (-1, -1).
        let ast = parse("=A1");
        assert_eq!(ast, Ast::CellReference(CellAddress::relative(-1, -1)));
    }

    #[test]
    fn absolute_markers_pin_components() {
        let ast = parse("=$A$1");
        assert_eq!(
            ast,
            Ast::CellReference(CellAddress {
                sheet: SheetSlot::Current,
                col: CellCoord::Absolute(0),
                row: CellCoord::Absolute(0),
            })
        );
    }

    #[test]
    fn reversed_ranges_normalise() {
        assert_eq!(parse("=SUM(A2:A1)"), parse("=SUM(A1:A2)"));
    }

    #[test]
    fn sheet_prefixes_resolve() {
        let ast = parse("=Sheet2!A1");
        match ast {
            Ast::CellReference(addr) => assert_eq!(addr.sheet, SheetSlot::Sheet(1)),
            other => panic!("unexpected parse: {other:?}"),
        }
        assert_eq!(parse("=Missing!A1"), Ast::Error(ErrorKind::Ref));
    }

    #[test]
    fn column_and_row_ranges() {
        match parse("=SUM(A:A)") {
            Ast::FunctionCall { args, .. } => {
                assert!(matches!(args[0], Ast::ColumnRange { .. }));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
        match parse("=SUM(1:3)") {
            Ast::FunctionCall { args, .. } => {
                assert!(matches!(args[0], Ast::RowRange { .. }));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn missing_arguments_parse_as_empty() {
        match parse("=IF(A1,,2)") {
            Ast::FunctionCall { name, args } => {
                assert_eq!(name, "IF");
                assert_eq!(args.len(), 3);
                assert_eq!(args[1], Ast::Empty);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn array_literals_are_rectangular() {
        match parse("={1,2;3,4}") {
            Ast::ArrayLiteral(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].len(), 2);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
        let base = SimpleCellAddress::new(0, 0, 0);
        assert!(parse_formula("={1,2;3}", base, &NoSheets, &Config::default()).is_err());
    }

    #[test]
    fn named_expressions_and_booleans() {
        assert_eq!(parse("=TRUE"), Ast::Bool(true));
        assert_eq!(
            parse("=tax_rate"),
            Ast::NamedExpression("tax_rate".to_string())
        );
    }

    #[test]
    fn distribution_literal_in_formula() {
        match parse("=N(μ=1, σ²=2)+A1") {
            Ast::Binary { left, .. } => {
                assert_eq!(
                    *left,
                    Ast::Distribution(DistributionLiteral::Gaussian {
                        mean: 1.0,
                        variance: 2.0
                    })
                );
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn identical_formulas_at_different_addresses_share_a_hash() {
        let config = Config::default();
        let a = parse_formula(
            "=A1+B1",
            SimpleCellAddress::new(0, 2, 1),
            &NoSheets,
            &config,
        )
        .unwrap();
        let b = parse_formula(
            "=A2+B2",
            SimpleCellAddress::new(0, 2, 2),
            &NoSheets,
            &config,
        )
        .unwrap();
        assert_eq!(a.hash, b.hash);

        let c = parse_formula(
            "=$A$1+B1",
            SimpleCellAddress::new(0, 2, 1),
            &NoSheets,
            &config,
        )
        .unwrap();
        assert_ne!(a.hash, c.hash);
    }

    #[test]
    fn percent_postfix() {
        match parse("=50%") {
            Ast::Unary {
                op: UnaryOp::Percent,
                expr,
            } => assert_eq!(*expr, Ast::Number(50.0)),
            other => panic!("unexpected parse: {other:?}"),
        }
    }
}
