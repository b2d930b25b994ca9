use pretty_assertions::assert_eq;
use riskgrid_engine::parser::{
    collect_dependencies, parse_formula, Ast, ParserCache, SheetIndex,
};
use riskgrid_engine::{Config, Engine, SheetId, SimpleCellAddress, Value};

struct TwoSheets;
impl SheetIndex for TwoSheets {
    fn sheet_id_by_name(&self, name: &str) -> Option<SheetId> {
        match name {
            "Sheet1" => Some(0),
            "Data" => Some(1),
            _ => None,
        }
    }
}

#[test]
fn shifted_copies_share_one_ast() {
    let config = Config::default();
    let mut cache = ParserCache::new();

    // A column of running-total formulas all hash identically.
    let mut hashes = Vec::new();
    for row in 1..=50u32 {
        let parsed = parse_formula(
            &format!("=A{row}+B{row}*2"),
            SimpleCellAddress::new(0, 2, row - 1),
            &TwoSheets,
            &config,
        )
        .unwrap();
        cache.maybe_set_and_get(&parsed.hash, &parsed.ast);
        hashes.push(parsed.hash);
    }
    assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(cache.len(), 1);
}

#[test]
fn absolute_references_break_sharing() {
    let config = Config::default();
    let base_a = SimpleCellAddress::new(0, 2, 0);
    let base_b = SimpleCellAddress::new(0, 2, 1);

    let relative_a = parse_formula("=A1", base_a, &TwoSheets, &config).unwrap();
    let relative_b = parse_formula("=A2", base_b, &TwoSheets, &config).unwrap();
    assert_eq!(relative_a.hash, relative_b.hash);

    let absolute_a = parse_formula("=$A$1", base_a, &TwoSheets, &config).unwrap();
    let absolute_b = parse_formula("=$A$1", base_b, &TwoSheets, &config).unwrap();
    assert_eq!(absolute_a.hash, absolute_b.hash);
    assert_ne!(relative_a.hash, absolute_a.hash);
}

#[test]
fn localized_function_names_canonicalize_into_the_same_hash() {
    use riskgrid_engine::TranslationPackage;
    use std::sync::Arc;

    let translated = Config {
        translation: Arc::new(TranslationPackage::new(
            [("SUMME".to_string(), "SUM".to_string())],
            [],
        )),
        ..Config::default()
    };
    let base = SimpleCellAddress::new(0, 1, 0);
    let local = parse_formula("=SUMME(A1:A3)", base, &TwoSheets, &translated).unwrap();
    let canonical = parse_formula("=SUM(A1:A3)", base, &TwoSheets, &translated).unwrap();
    assert_eq!(local.hash, canonical.hash);
    assert_eq!(local.ast, canonical.ast);
}

#[test]
fn graph_predecessors_equal_absolutized_dependencies() {
    let mut engine = Engine::new();
    engine.set_cell_contents("Sheet1", "A1", "1").unwrap();
    engine.set_cell_contents("Sheet1", "A2", "2").unwrap();
    engine
        .set_cell_contents("Sheet1", "C1", "=A1+SUM(A1:A2)+A2")
        .unwrap();

    let parsed = parse_formula(
        "=A1+SUM(A1:A2)+A2",
        SimpleCellAddress::new(0, 2, 0),
        &TwoSheets,
        &Config::default(),
    )
    .unwrap();
    let dep_count = collect_dependencies(&parsed.ast).len();
    assert_eq!(dep_count, 3);

    // The formula vertex has exactly one predecessor per dependency (the
    // range dependency appears as a range vertex).
    let graph = engine.graph();
    let c1 = graph
        .id_at(SimpleCellAddress::new(0, 2, 0))
        .expect("formula vertex");
    assert_eq!(graph.precedent_ids(c1).len(), 3);
}

#[test]
fn locale_separators_parse_and_evaluate() {
    let config = Config {
        decimal_separator: ',',
        thousand_separator: Some('.'),
        function_arg_separator: ';',
        ..Config::default()
    };
    let mut engine = Engine::with_config(config).unwrap();
    engine.set_cell_contents("Sheet1", "A1", "1,5").unwrap();
    engine
        .set_cell_contents("Sheet1", "B1", "=IF(A1>1;A1*2;0)")
        .unwrap();
    assert_eq!(engine.get_cell_value("Sheet1", "B1"), Value::number(3.0));
}

#[test]
fn reversed_range_corners_normalize_into_the_same_hash() {
    let config = Config::default();
    let base = SimpleCellAddress::new(0, 1, 0);
    let forward = parse_formula("=SUM(A1:A5)", base, &TwoSheets, &config).unwrap();
    let reversed = parse_formula("=SUM(A5:A1)", base, &TwoSheets, &config).unwrap();
    assert_eq!(forward.hash, reversed.hash);
    assert_eq!(forward.ast, reversed.ast);
}

#[test]
fn unresolvable_sheet_references_parse_to_ref_errors() {
    let config = Config::default();
    let base = SimpleCellAddress::new(0, 0, 0);
    let parsed = parse_formula("=Nowhere!B2", base, &TwoSheets, &config).unwrap();
    assert_eq!(parsed.ast, Ast::Error(riskgrid_engine::ErrorKind::Ref));
}
