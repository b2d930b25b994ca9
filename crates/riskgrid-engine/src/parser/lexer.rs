use riskgrid_model::ErrorKind;

use super::ast::DistributionLiteral;
use super::{ParsingError, ParsingErrorKind};
use crate::config::Config;
use crate::literals;

/// Byte span of a token in the formula source (start, end).
pub type Span = (usize, usize);

/// An A1-style cell token before sheet attachment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CellToken {
    pub col: u32,
    pub row: u32,
    pub col_abs: bool,
    pub row_abs: bool,
}

/// An R1C1-style cell token. Coordinates are 0-indexed when absolute and
/// offsets when bracketed (`R[2]C[-1]`); a bare `R`/`C` is a zero offset.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct R1C1Token {
    pub row_abs: Option<u32>,
    pub row_offset: i64,
    pub col_abs: Option<u32>,
    pub col_offset: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Text(String),
    Error(ErrorKind),
    Cell(CellToken),
    R1C1(R1C1Token),
    Ident(String),
    /// `'Quoted Sheet Name'`.
    QuotedIdent(String),
    Distribution(DistributionLiteral),
    LParen,
    RParen,
    LBrace,
    RBrace,
    ArgSep,
    RowSep,
    Colon,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Amp,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Formulas longer than this are rejected before lexing; it bounds the work
/// a pathological input can cause.
pub const MAX_FORMULA_CHARS: usize = 8_192;

/// Tokenise a formula body (without the leading `=`).
pub fn lex(source: &str, config: &Config) -> Result<Vec<Token>, ParsingError> {
    if source.chars().count() > MAX_FORMULA_CHARS {
        return Err(ParsingError {
            kind: ParsingErrorKind::LexingError,
            message: format!("formula exceeds the {MAX_FORMULA_CHARS}-character limit"),
        });
    }
    Lexer {
        source,
        bytes: source.as_bytes(),
        pos: 0,
        config,
    }
    .run()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    config: &'a Config,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Vec<Token>, ParsingError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let Some(&b) = self.bytes.get(self.pos) else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: (start, start),
                });
                return Ok(tokens);
            };

            // The argument separator is configurable and may shadow a fixed
            // token (`;` in European locales), so it is matched first.
            if self.current_char() == self.config.function_arg_separator {
                self.pos += self.config.function_arg_separator.len_utf8();
                tokens.push(Token {
                    kind: TokenKind::ArgSep,
                    span: (start, self.pos),
                });
                continue;
            }

            let kind = match b {
                b'(' => self.single(TokenKind::LParen),
                b')' => self.single(TokenKind::RParen),
                b'{' => self.single(TokenKind::LBrace),
                b'}' => self.single(TokenKind::RBrace),
                b':' => self.single(TokenKind::Colon),
                b'!' => self.single(TokenKind::Bang),
                b'+' => self.single(TokenKind::Plus),
                b'-' => self.single(TokenKind::Minus),
                b'*' => self.single(TokenKind::Star),
                b'/' => self.single(TokenKind::Slash),
                b'^' => self.single(TokenKind::Caret),
                b'&' => self.single(TokenKind::Amp),
                b'%' => self.single(TokenKind::Percent),
                b'=' => self.single(TokenKind::Eq),
                b'<' => {
                    self.pos += 1;
                    match self.bytes.get(self.pos) {
                        Some(b'=') => {
                            self.pos += 1;
                            TokenKind::Le
                        }
                        Some(b'>') => {
                            self.pos += 1;
                            TokenKind::Ne
                        }
                        _ => TokenKind::Lt,
                    }
                }
                b'>' => {
                    self.pos += 1;
                    if self.bytes.get(self.pos) == Some(&b'=') {
                        self.pos += 1;
                        TokenKind::Ge
                    } else {
                        TokenKind::Gt
                    }
                }
                b'"' => self.lex_string()?,
                b'#' => self.lex_error_literal()?,
                // Array row separator: `;` normally, `|` when `;` is taken
                // by the argument separator.
                b';' | b'|' => self.single(TokenKind::RowSep),
                _ => {
                    let c = self.current_char();
                    if c == '\'' {
                        self.lex_quoted_ident()?
                    } else if c.is_ascii_digit()
                        || (c == self.config.decimal_separator && self.peek_digit_after(1))
                    {
                        self.lex_number()?
                    } else if c.is_alphabetic() || c == '_' || c == '$' {
                        if let Some(kind) = self.try_lex_distribution() {
                            kind
                        } else if let Some(kind) = self.try_lex_cell() {
                            kind
                        } else if let Some(kind) = self.try_lex_r1c1() {
                            kind
                        } else if c == '$' {
                            // `$A` / `$3` halves of absolute column and row
                            // ranges lex as `$`-prefixed identifiers; the
                            // parser reassembles them around the colon.
                            self.lex_dollar_ident(start)?
                        } else {
                            self.lex_ident()
                        }
                    } else {
                        return Err(ParsingError {
                            kind: ParsingErrorKind::LexingError,
                            message: format!("unexpected character `{c}` at byte {start}"),
                        });
                    }
                }
            };

            tokens.push(Token {
                kind,
                span: (start, self.pos),
            });
        }
    }

    fn current_char(&self) -> char {
        self.source[self.pos..]
            .chars()
            .next()
            .expect("caller checked a byte exists")
    }

    fn peek_digit_after(&self, offset: usize) -> bool {
        self.bytes
            .get(self.pos + offset)
            .is_some_and(u8::is_ascii_digit)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn skip_whitespace(&mut self) {
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    fn lex_string(&mut self) -> Result<TokenKind, ParsingError> {
        self.pos += 1; // opening quote
        let mut out = String::new();
        loop {
            match self.bytes.get(self.pos) {
                None => {
                    return Err(ParsingError {
                        kind: ParsingErrorKind::LexingError,
                        message: "unterminated string literal".to_string(),
                    });
                }
                Some(b'"') => {
                    // `""` is an escaped quote.
                    if self.bytes.get(self.pos + 1) == Some(&b'"') {
                        out.push('"');
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        return Ok(TokenKind::Text(out));
                    }
                }
                Some(_) => {
                    let c = self.current_char();
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn lex_quoted_ident(&mut self) -> Result<TokenKind, ParsingError> {
        self.pos += 1; // opening apostrophe
        let mut out = String::new();
        loop {
            match self.bytes.get(self.pos) {
                None => {
                    return Err(ParsingError {
                        kind: ParsingErrorKind::LexingError,
                        message: "unterminated quoted sheet name".to_string(),
                    });
                }
                Some(b'\'') => {
                    if self.bytes.get(self.pos + 1) == Some(&b'\'') {
                        out.push('\'');
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        return Ok(TokenKind::QuotedIdent(out));
                    }
                }
                Some(_) => {
                    let c = self.current_char();
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn lex_error_literal(&mut self) -> Result<TokenKind, ParsingError> {
        let start = self.pos;
        self.pos += 1; // '#'
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'/')
        {
            self.pos += 1;
        }
        if matches!(self.bytes.get(self.pos), Some(b'?') | Some(b'!')) {
            self.pos += 1;
        }
        let text = &self.source[start..self.pos];
        match self.config.translation.parse_error_code(text) {
            Some(kind) => Ok(TokenKind::Error(kind)),
            None => Err(ParsingError {
                kind: ParsingErrorKind::LexingError,
                message: format!("unknown error literal `{text}`"),
            }),
        }
    }

    fn lex_number(&mut self) -> Result<TokenKind, ParsingError> {
        let start = self.pos;
        let decimal = self.config.decimal_separator;
        let thousand = self.config.thousand_separator;
        let mut seen_exponent = false;

        loop {
            let Some(c) = self.source[self.pos..].chars().next() else {
                break;
            };
            let take = if c.is_ascii_digit() {
                true
            } else if c == decimal || Some(c) == thousand {
                true
            } else if (c == 'e' || c == 'E') && !seen_exponent && self.peek_digit_or_sign_after(1) {
                seen_exponent = true;
                true
            } else {
                (c == '+' || c == '-')
                    && seen_exponent
                    && matches!(self.bytes.get(self.pos.wrapping_sub(1)), Some(b'e' | b'E'))
            };
            if !take {
                break;
            }
            self.pos += c.len_utf8();
        }

        let text = &self.source[start..self.pos];
        match literals::parse_number(text, self.config) {
            Some(n) if n.is_finite() => Ok(TokenKind::Number(n)),
            _ => Err(ParsingError {
                kind: ParsingErrorKind::LexingError,
                message: format!("malformed number literal `{text}`"),
            }),
        }
    }

    fn peek_digit_or_sign_after(&self, offset: usize) -> bool {
        self.bytes
            .get(self.pos + offset)
            .is_some_and(|b| b.is_ascii_digit() || *b == b'+' || *b == b'-')
    }

    /// Distribution literal forms usable inside formulas: `N(…)`, `S(…)`,
    /// `LN(…)`, `U(…)`, `CI[…]`, `P95[…]`. `LN(x)` with a single argument
    /// falls through to the ordinary `LN` function.
    fn try_lex_distribution(&mut self) -> Option<TokenKind> {
        let rest = &self.source[self.pos..];
        let (literal, consumed) = literals::match_formula_distribution(rest, self.config)?;
        self.pos += consumed;
        Some(TokenKind::Distribution(literal))
    }

    /// A1 cell pattern with optional `$` markers, e.g. `A1`, `$B$2`.
    fn try_lex_cell(&mut self) -> Option<TokenKind> {
        let bytes = self.bytes;
        let mut idx = self.pos;

        let col_abs = bytes.get(idx) == Some(&b'$');
        if col_abs {
            idx += 1;
        }
        let col_start = idx;
        while bytes.get(idx).is_some_and(u8::is_ascii_alphabetic) {
            idx += 1;
        }
        if idx == col_start || idx - col_start > 3 {
            return None;
        }
        let col_end = idx;

        let row_abs = bytes.get(idx) == Some(&b'$');
        if row_abs {
            idx += 1;
        }
        let row_start = idx;
        while bytes.get(idx).is_some_and(u8::is_ascii_digit) {
            idx += 1;
        }
        if idx == row_start {
            return None;
        }

        // `A1B` is an identifier, not a cell followed by garbage.
        if bytes
            .get(idx)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'.')
        {
            return None;
        }

        let col = riskgrid_model::name_to_col(&self.source[col_start..col_end]).ok()?;
        let row_1_based: u32 = self.source[row_start..idx].parse().ok()?;
        if row_1_based == 0 {
            return None;
        }

        self.pos = idx;
        Some(TokenKind::Cell(CellToken {
            col,
            row: row_1_based - 1,
            col_abs,
            row_abs,
        }))
    }

    /// R1C1 pattern: `R2C3` (absolute, 1-based) or `R[2]C[-1]` (offsets).
    fn try_lex_r1c1(&mut self) -> Option<TokenKind> {
        let bytes = self.bytes;
        let mut idx = self.pos;

        if !matches!(bytes.get(idx), Some(b'R' | b'r')) {
            return None;
        }
        idx += 1;
        let (row_abs, row_offset, next) = Self::r1c1_coord(self.source, bytes, idx)?;
        idx = next;

        if !matches!(bytes.get(idx), Some(b'C' | b'c')) {
            return None;
        }
        idx += 1;
        let (col_abs, col_offset, next) = Self::r1c1_coord(self.source, bytes, idx)?;
        idx = next;

        if bytes
            .get(idx)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'.')
        {
            return None;
        }

        self.pos = idx;
        Some(TokenKind::R1C1(R1C1Token {
            row_abs,
            row_offset,
            col_abs,
            col_offset,
        }))
    }

    fn r1c1_coord(source: &str, bytes: &[u8], mut idx: usize) -> Option<(Option<u32>, i64, usize)> {
        if bytes.get(idx) == Some(&b'[') {
            idx += 1;
            let start = idx;
            if bytes.get(idx) == Some(&b'-') {
                idx += 1;
            }
            while bytes.get(idx).is_some_and(u8::is_ascii_digit) {
                idx += 1;
            }
            if bytes.get(idx) != Some(&b']') {
                return None;
            }
            let offset: i64 = source[start..idx].parse().ok()?;
            return Some((None, offset, idx + 1));
        }

        let start = idx;
        while bytes.get(idx).is_some_and(u8::is_ascii_digit) {
            idx += 1;
        }
        if idx == start {
            // Bare `R` / `C`: zero offset.
            return Some((None, 0, idx));
        }
        let index_1_based: u32 = source[start..idx].parse().ok()?;
        if index_1_based == 0 {
            return None;
        }
        Some((Some(index_1_based - 1), 0, idx))
    }

    fn lex_dollar_ident(&mut self, start: usize) -> Result<TokenKind, ParsingError> {
        self.pos += 1; // '$'
        let run_start = self.pos;
        if self.bytes.get(self.pos).is_some_and(u8::is_ascii_alphabetic) {
            while self
                .bytes
                .get(self.pos)
                .is_some_and(u8::is_ascii_alphabetic)
            {
                self.pos += 1;
            }
        } else if self.bytes.get(self.pos).is_some_and(u8::is_ascii_digit) {
            while self.bytes.get(self.pos).is_some_and(u8::is_ascii_digit) {
                self.pos += 1;
            }
        } else {
            return Err(ParsingError {
                kind: ParsingErrorKind::LexingError,
                message: format!("unexpected `$` at byte {start}"),
            });
        }
        Ok(TokenKind::Ident(format!(
            "${}",
            &self.source[run_start..self.pos]
        )))
    }

    fn lex_ident(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.source[self.pos..].chars().next() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        TokenKind::Ident(self.source[start..self.pos].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let config = Config::default();
        lex(source, &config)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn arithmetic_tokens() {
        assert_eq!(
            kinds("1+2*3"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Plus,
                TokenKind::Number(2.0),
                TokenKind::Star,
                TokenKind::Number(3.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn cell_tokens_with_absolute_markers() {
        assert_eq!(
            kinds("$A$1:B2"),
            vec![
                TokenKind::Cell(CellToken {
                    col: 0,
                    row: 0,
                    col_abs: true,
                    row_abs: true
                }),
                TokenKind::Colon,
                TokenKind::Cell(CellToken {
                    col: 1,
                    row: 1,
                    col_abs: false,
                    row_abs: false
                }),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn idents_are_not_cells() {
        assert_eq!(
            kinds("A1B"),
            vec![TokenKind::Ident("A1B".to_string()), TokenKind::Eof]
        );
        assert_eq!(
            kinds("SUM("),
            vec![
                TokenKind::Ident("SUM".to_string()),
                TokenKind::LParen,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn r1c1_tokens() {
        assert_eq!(
            kinds("R2C3"),
            vec![
                TokenKind::R1C1(R1C1Token {
                    row_abs: Some(1),
                    row_offset: 0,
                    col_abs: Some(2),
                    col_offset: 0
                }),
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("R[-1]C[2]"),
            vec![
                TokenKind::R1C1(R1C1Token {
                    row_abs: None,
                    row_offset: -1,
                    col_abs: None,
                    col_offset: 2
                }),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn strings_escape_doubled_quotes() {
        assert_eq!(
            kinds(r#""he said ""hi""""#),
            vec![
                TokenKind::Text("he said \"hi\"".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn error_literals() {
        assert_eq!(
            kinds("#DIV/0!"),
            vec![TokenKind::Error(ErrorKind::DivByZero), TokenKind::Eof]
        );
        assert!(lex("#WAT!", &Config::default()).is_err());
    }

    #[test]
    fn distribution_literal_inside_formula() {
        let tokens = kinds("N(μ=1, σ²=2)+1");
        assert_eq!(
            tokens[0],
            TokenKind::Distribution(DistributionLiteral::Gaussian {
                mean: 1.0,
                variance: 2.0
            })
        );
        assert_eq!(tokens[1], TokenKind::Plus);
    }

    #[test]
    fn single_argument_ln_is_a_function_call() {
        assert_eq!(
            kinds("LN(5)"),
            vec![
                TokenKind::Ident("LN".to_string()),
                TokenKind::LParen,
                TokenKind::Number(5.0),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn two_argument_ln_is_a_distribution() {
        assert_eq!(
            kinds("LN(0, 0.25)"),
            vec![
                TokenKind::Distribution(DistributionLiteral::LogNormal {
                    mu: 0.0,
                    sigma_sq: 0.25
                }),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn quoted_sheet_names() {
        assert_eq!(
            kinds("'My Sheet'!A1"),
            vec![
                TokenKind::QuotedIdent("My Sheet".to_string()),
                TokenKind::Bang,
                TokenKind::Cell(CellToken {
                    col: 0,
                    row: 0,
                    col_abs: false,
                    row_abs: false
                }),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn locale_argument_separator() {
        let config = Config {
            decimal_separator: ',',
            function_arg_separator: ';',
            ..Config::default()
        };
        let tokens: Vec<TokenKind> = lex("1,5;2", &config)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            tokens,
            vec![
                TokenKind::Number(1.5),
                TokenKind::ArgSep,
                TokenKind::Number(2.0),
                TokenKind::Eof
            ]
        );
    }
}
