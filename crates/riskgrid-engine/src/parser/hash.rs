//! The canonical, reference-independent rendering of an AST.
//!
//! The printed form is the cache key: relative references render as offsets,
//! absolute components as pinned indices, function names in canonical
//! spelling, numbers under the configured decimal separator. Two formulas
//! that differ only in where they sit produce identical hashes.

use riskgrid_model::{CellAddress, CellCoord, SheetSlot};

use super::ast::{Ast, ColumnAddress, DistributionLiteral, RowAddress, UnaryOp};
use crate::config::Config;

/// Render the canonical hash text for an AST.
#[must_use]
pub fn hash_ast(ast: &Ast, config: &Config) -> String {
    let mut out = String::new();
    write_node(&mut out, ast, config);
    out
}

fn write_node(out: &mut String, ast: &Ast, config: &Config) {
    match ast {
        Ast::Empty => {}
        Ast::Number(n) => out.push_str(&format_number(*n, config)),
        Ast::Text(s) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
        Ast::Bool(b) => out.push_str(if *b { "TRUE" } else { "FALSE" }),
        Ast::Error(kind) => out.push_str(kind.as_code()),
        Ast::Distribution(literal) => write_distribution(out, literal, config),
        Ast::CellReference(addr) => write_cell(out, addr),
        Ast::CellRange { start, end } => {
            write_cell(out, start);
            out.push(':');
            write_cell(out, end);
        }
        Ast::ColumnRange { start, end } => {
            write_column(out, start);
            out.push(':');
            write_column(out, end);
        }
        Ast::RowRange { start, end } => {
            write_row(out, start);
            out.push(':');
            write_row(out, end);
        }
        Ast::NamedExpression(name) => {
            out.push_str("name:");
            out.push_str(&name.to_lowercase());
        }
        Ast::FunctionCall { name, args } => {
            out.push_str(name);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push(config.function_arg_separator);
                }
                write_node(out, arg, config);
            }
            out.push(')');
        }
        Ast::ArrayLiteral(rows) => {
            out.push('{');
            for (ri, row) in rows.iter().enumerate() {
                if ri > 0 {
                    out.push(';');
                }
                for (ci, el) in row.iter().enumerate() {
                    if ci > 0 {
                        out.push(config.function_arg_separator);
                    }
                    write_node(out, el, config);
                }
            }
            out.push('}');
        }
        Ast::Parenthesis(inner) => {
            out.push('(');
            write_node(out, inner, config);
            out.push(')');
        }
        Ast::Unary { op, expr } => match op {
            UnaryOp::Plus => {
                out.push('+');
                write_node(out, expr, config);
            }
            UnaryOp::Minus => {
                out.push('-');
                write_node(out, expr, config);
            }
            UnaryOp::Percent => {
                write_node(out, expr, config);
                out.push('%');
            }
        },
        Ast::Binary { op, left, right } => {
            write_node(out, left, config);
            out.push_str(op.symbol());
            write_node(out, right, config);
        }
    }
}

fn format_number(n: f64, config: &Config) -> String {
    let text = format!("{n}");
    if config.decimal_separator == '.' {
        text
    } else {
        text.replace('.', &config.decimal_separator.to_string())
    }
}

fn write_distribution(out: &mut String, literal: &DistributionLiteral, config: &Config) {
    match literal {
        DistributionLiteral::Gaussian { mean, variance } => {
            out.push_str("N(");
            out.push_str(&format_number(*mean, config));
            out.push(config.function_arg_separator);
            out.push_str(&format_number(*variance, config));
            out.push(')');
        }
        DistributionLiteral::Sampled { mean, variance } => {
            out.push_str("S(");
            out.push_str(&format_number(*mean, config));
            out.push(config.function_arg_separator);
            out.push_str(&format_number(*variance, config));
            out.push(')');
        }
        DistributionLiteral::LogNormal { mu, sigma_sq } => {
            out.push_str("LN(");
            out.push_str(&format_number(*mu, config));
            out.push(config.function_arg_separator);
            out.push_str(&format_number(*sigma_sq, config));
            out.push(')');
        }
        DistributionLiteral::Uniform { lo, hi } => {
            out.push_str("U(");
            out.push_str(&format_number(*lo, config));
            out.push(config.function_arg_separator);
            out.push_str(&format_number(*hi, config));
            out.push(')');
        }
        DistributionLiteral::ConfidenceInterval { lo, hi, confidence } => {
            out.push_str("CI(");
            out.push_str(&format_number(*lo, config));
            out.push(config.function_arg_separator);
            out.push_str(&format_number(*hi, config));
            out.push(config.function_arg_separator);
            out.push_str(&format_number(*confidence, config));
            out.push(')');
        }
    }
}

/// Cell reference hash: `#<sheet><col>C<row>R`, where each component prints
/// as a bare offset when relative or an `A`-tagged index when absolute.
fn write_cell(out: &mut String, addr: &CellAddress) {
    out.push('#');
    write_sheet(out, addr.sheet);
    write_coord(out, addr.col);
    out.push('C');
    write_coord(out, addr.row);
    out.push('R');
}

fn write_column(out: &mut String, addr: &ColumnAddress) {
    out.push('#');
    write_sheet(out, addr.sheet);
    write_coord(out, addr.col);
    out.push('C');
}

fn write_row(out: &mut String, addr: &RowAddress) {
    out.push('#');
    write_sheet(out, addr.sheet);
    write_coord(out, addr.row);
    out.push('R');
}

fn write_sheet(out: &mut String, sheet: SheetSlot) {
    if let SheetSlot::Sheet(id) = sheet {
        out.push('s');
        out.push_str(&id.to_string());
        out.push('!');
    }
}

fn write_coord(out: &mut String, coord: CellCoord) {
    match coord {
        CellCoord::Relative(offset) => out.push_str(&offset.to_string()),
        CellCoord::Absolute(index) => {
            out.push('A');
            out.push_str(&index.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskgrid_model::ErrorKind;

    #[test]
    fn relative_and_absolute_references_hash_differently() {
        let config = Config::default();
        let relative = Ast::CellReference(CellAddress::relative(-1, 0));
        let absolute = Ast::CellReference(CellAddress {
            sheet: SheetSlot::Current,
            col: CellCoord::Absolute(0),
            row: CellCoord::Relative(0),
        });
        assert_eq!(hash_ast(&relative, &config), "#-1C0R");
        assert_eq!(hash_ast(&absolute, &config), "#A0C0R");
    }

    #[test]
    fn function_calls_use_the_configured_separator() {
        let config = Config {
            decimal_separator: ',',
            function_arg_separator: ';',
            ..Config::default()
        };
        let ast = Ast::FunctionCall {
            name: "SUM".to_string(),
            args: vec![Ast::Number(1.5), Ast::Number(2.0)],
        };
        assert_eq!(hash_ast(&ast, &config), "SUM(1,5;2)");
    }

    #[test]
    fn named_expressions_hash_case_insensitively() {
        let config = Config::default();
        let a = Ast::NamedExpression("TaxRate".to_string());
        let b = Ast::NamedExpression("taxrate".to_string());
        assert_eq!(hash_ast(&a, &config), hash_ast(&b, &config));
    }

    #[test]
    fn errors_and_distributions_render_canonically() {
        let config = Config::default();
        assert_eq!(hash_ast(&Ast::Error(ErrorKind::Ref), &config), "#REF!");
        assert_eq!(
            hash_ast(
                &Ast::Distribution(DistributionLiteral::Gaussian {
                    mean: 1.0,
                    variance: 2.0
                }),
                &config
            ),
            "N(1,2)"
        );
    }
}
