use riskgrid_engine::{Engine, ErrorKind, Value};

fn eval(formula: &str) -> Value {
    let mut engine = Engine::new();
    engine.set_cell_contents("Sheet1", "A1", formula).unwrap();
    engine.get_cell_value("Sheet1", "A1")
}

fn expect_number(formula: &str) -> f64 {
    match eval(formula) {
        Value::Number(n) => n.val(),
        other => panic!("{formula}: expected number, got {other:?}"),
    }
}

fn expect_text(formula: &str) -> String {
    match eval(formula) {
        Value::Text(s) => s,
        other => panic!("{formula}: expected text, got {other:?}"),
    }
}

fn expect_error(formula: &str, kind: ErrorKind) {
    match eval(formula) {
        Value::Error(e) => assert_eq!(e.kind, kind, "{formula}"),
        other => panic!("{formula}: expected {kind:?}, got {other:?}"),
    }
}

#[test]
fn logical_functions() {
    assert_eq!(eval("=IF(1<2, \"yes\", \"no\")"), Value::Text("yes".into()));
    assert_eq!(eval("=IF(FALSE, 1)"), Value::Bool(false));
    assert_eq!(eval("=AND(TRUE, 1, \"TRUE\")"), Value::Bool(true));
    assert_eq!(eval("=OR(FALSE, 0)"), Value::Bool(false));
    assert_eq!(eval("=XOR(TRUE, TRUE, TRUE)"), Value::Bool(true));
    assert_eq!(eval("=NOT(0)"), Value::Bool(true));
    assert_eq!(eval("=CHOOSE(2, \"a\", \"b\", \"c\")"), Value::Text("b".into()));
    assert_eq!(
        eval("=SWITCH(3, 1, \"one\", 3, \"three\", \"other\")"),
        Value::Text("three".into())
    );
    assert_eq!(
        eval("=SWITCH(9, 1, \"one\", \"fallback\")"),
        Value::Text("fallback".into())
    );
    expect_error("=IFS(FALSE, 1, FALSE, 2)", ErrorKind::Na);
    assert_eq!(eval("=IFS(FALSE, 1, TRUE, 2)"), Value::number(2.0));
}

#[test]
fn text_functions() {
    assert_eq!(expect_text("=CONCATENATE(\"ab\", \"cd\", 1)"), "abcd1");
    assert_eq!(expect_number("=LEN(\"héllo\")"), 5.0);
    assert_eq!(expect_text("=LEFT(\"riskgrid\", 4)"), "risk");
    assert_eq!(expect_text("=LEFT(\"riskgrid\")"), "r");
    assert_eq!(expect_text("=RIGHT(\"riskgrid\", 4)"), "grid");
    assert_eq!(expect_text("=MID(\"riskgrid\", 5, 4)"), "grid");
    assert_eq!(expect_text("=TRIM(\"  a   b  \")"), "a b");
    assert_eq!(expect_text("=PROPER(\"john o'neil\")"), "John O'Neil");
    assert_eq!(expect_text("=REPT(\"ab\", 3)"), "ababab");
    assert_eq!(expect_text("=UPPER(\"abc\")"), "ABC");
    assert_eq!(expect_text("=LOWER(\"ABC\")"), "abc");
    assert_eq!(eval("=EXACT(\"a\", \"A\")"), Value::Bool(false));
    assert_eq!(
        expect_text("=SUBSTITUTE(\"aaa\", \"a\", \"b\", 2)"),
        "aba"
    );
    assert_eq!(expect_text("=SUBSTITUTE(\"aaa\", \"a\", \"b\")"), "bbb");
    assert_eq!(expect_text("=T(\"text\")"), "text");
    assert_eq!(expect_text("=T(42)"), "");
}

#[test]
fn search_and_find() {
    assert_eq!(expect_number("=SEARCH(\"GRID\", \"riskgrid\")"), 5.0);
    assert_eq!(expect_number("=SEARCH(\"r?sk\", \"risk\")"), 1.0);
    expect_error("=FIND(\"GRID\", \"riskgrid\")", ErrorKind::Value);
    assert_eq!(expect_number("=FIND(\"grid\", \"riskgrid\")"), 5.0);
    assert_eq!(expect_number("=FIND(\"i\", \"riskgrid\", 3)"), 6.0);
}

#[test]
fn char_and_unichar_bounds() {
    assert_eq!(expect_text("=CHAR(65)"), "A");
    expect_error("=CHAR(0.5)", ErrorKind::Value);
    expect_error("=CHAR(256)", ErrorKind::Value);
    assert_eq!(expect_text("=UNICHAR(960)"), "π");
    expect_error("=UNICHAR(0)", ErrorKind::Value);
    expect_error("=UNICHAR(1114112)", ErrorKind::Value);
}

#[test]
fn rounding_functions() {
    assert_eq!(expect_number("=ROUND(2.5)"), 3.0);
    assert_eq!(expect_number("=ROUND(-2.5)"), -3.0);
    assert_eq!(expect_number("=ROUND(1.234, 2)"), 1.23);
    assert_eq!(expect_number("=ROUNDUP(1.21, 1)"), 1.3);
    assert_eq!(expect_number("=ROUNDDOWN(1.29, 1)"), 1.2);
    assert_eq!(expect_number("=INT(-1.5)"), -2.0);
    assert_eq!(expect_number("=EVEN(1.5)"), 2.0);
    assert_eq!(expect_number("=EVEN(-1.5)"), -2.0);
    assert_eq!(expect_number("=ODD(2)"), 3.0);
    assert_eq!(expect_number("=CEILING(2.5, 1)"), 3.0);
    expect_error("=CEILING(2.5, -1)", ErrorKind::Num);
    assert_eq!(expect_number("=CEILING.MATH(-5.5, 2)"), -4.0);
    assert_eq!(expect_number("=CEILING.MATH(-5.5, 2, 1)"), -6.0);
    assert_eq!(expect_number("=CEILING.PRECISE(-5.5, -2)"), -4.0);
    assert_eq!(expect_number("=FLOOR(2.5, 1)"), 2.0);
    assert_eq!(expect_number("=FLOOR.PRECISE(-5.5, 2)"), -6.0);
}

#[test]
fn math_functions() {
    assert_eq!(expect_number("=MOD(7, 3)"), 1.0);
    assert_eq!(expect_number("=MOD(-7, 3)"), 2.0);
    expect_error("=MOD(1, 0)", ErrorKind::DivByZero);
    assert_eq!(expect_number("=ABS(-3)"), 3.0);
    assert!((expect_number("=PI()") - std::f64::consts::PI).abs() < 1e-12);
    assert!((expect_number("=SQRTPI(1)") - std::f64::consts::PI.sqrt()).abs() < 1e-12);
    assert!((expect_number("=RADIANS(180)") - std::f64::consts::PI).abs() < 1e-12);
    assert!((expect_number("=DEGREES(PI())") - 180.0).abs() < 1e-9);
    assert_eq!(expect_number("=DELTA(2, 2)"), 1.0);
    assert_eq!(expect_number("=DELTA(2)"), 0.0);
    assert_eq!(expect_number("=BITAND(12, 10)"), 8.0);
    assert_eq!(expect_number("=BITOR(12, 10)"), 14.0);
    assert_eq!(expect_number("=BITXOR(12, 10)"), 6.0);
    expect_error("=BITAND(-1, 2)", ErrorKind::Num);
    assert!((expect_number("=LN(EXP(2))") - 2.0).abs() < 1e-12);
    expect_error("=LN(0)", ErrorKind::Num);
    expect_error("=SQRT(-1)", ErrorKind::Num);
}

#[test]
fn trig_functions() {
    assert!((expect_number("=SIN(PI()/2)") - 1.0).abs() < 1e-12);
    assert!((expect_number("=COS(0)") - 1.0).abs() < 1e-12);
    assert!((expect_number("=TAN(PI()/4)") - 1.0).abs() < 1e-12);
    expect_error("=ASIN(2)", ErrorKind::Num);
    expect_error("=ACOSH(0.5)", ErrorKind::Num);
    expect_error("=ATANH(1)", ErrorKind::Num);
    expect_error("=COT(0)", ErrorKind::DivByZero);
    expect_error("=CSC(0)", ErrorKind::DivByZero);
    // Spreadsheet argument order: ATAN2(x, y) = atan2(y, x).
    assert!((expect_number("=ATAN2(1, 1)") - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
    expect_error("=ATAN2(0, 0)", ErrorKind::DivByZero);
    assert!((expect_number("=ACOT(0)") - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    assert!((expect_number("=SINH(0)")).abs() < 1e-12);
    assert!((expect_number("=TANH(0)")).abs() < 1e-12);
}

#[test]
fn aggregates_over_ranges() {
    let mut engine = Engine::new();
    engine.set_cell_contents("Sheet1", "A1", "1").unwrap();
    engine.set_cell_contents("Sheet1", "A2", "2").unwrap();
    engine.set_cell_contents("Sheet1", "A3", "text").unwrap();
    engine.set_cell_contents("Sheet1", "A4", "4").unwrap();

    engine
        .set_cell_contents("Sheet1", "B1", "=SUM(A1:A4)")
        .unwrap();
    engine
        .set_cell_contents("Sheet1", "B2", "=AVERAGE(A1:A4)")
        .unwrap();
    engine
        .set_cell_contents("Sheet1", "B3", "=MIN(A1:A4)")
        .unwrap();
    engine
        .set_cell_contents("Sheet1", "B4", "=MAX(A1:A4)")
        .unwrap();
    engine
        .set_cell_contents("Sheet1", "B5", "=COUNT(A1:A4)")
        .unwrap();

    assert_eq!(engine.get_cell_value("Sheet1", "B1"), Value::number(7.0));
    assert_eq!(
        engine.get_cell_value("Sheet1", "B2"),
        Value::number(7.0 / 3.0)
    );
    assert_eq!(engine.get_cell_value("Sheet1", "B3"), Value::number(1.0));
    assert_eq!(engine.get_cell_value("Sheet1", "B4"), Value::number(4.0));
    assert_eq!(engine.get_cell_value("Sheet1", "B5"), Value::number(3.0));
}

#[test]
fn countunique_ignores_empties_and_dedupes() {
    let mut engine = Engine::new();
    engine.set_cell_contents("Sheet1", "A1", "1").unwrap();
    engine.set_cell_contents("Sheet1", "A2", "1").unwrap();
    engine.set_cell_contents("Sheet1", "A3", "apple").unwrap();
    engine.set_cell_contents("Sheet1", "A4", "APPLE").unwrap();
    // A5 left empty.
    engine
        .set_cell_contents("Sheet1", "B1", "=COUNTUNIQUE(A1:A5, 2)")
        .unwrap();
    // {1, "apple", 2}: case-insensitive comparison folds the two apples.
    assert_eq!(engine.get_cell_value("Sheet1", "B1"), Value::number(3.0));
}

#[test]
fn concat_operator_and_comparisons() {
    assert_eq!(expect_text("=\"a\" & \"b\" & 1"), "ab1");
    assert_eq!(eval("=1 < 2"), Value::Bool(true));
    assert_eq!(eval("=\"abc\" = \"ABC\""), Value::Bool(true));
    assert_eq!(eval("=2 <> 2"), Value::Bool(false));
    // Type precedence: any number sorts below any text.
    assert_eq!(eval("=99 < \"1\""), Value::Bool(true));
}

#[test]
fn percent_literal_and_operator() {
    assert_eq!(expect_number("=50%"), 0.5);
    assert_eq!(expect_number("=50% * 200"), 100.0);
    let mut engine = Engine::new();
    engine.set_cell_contents("Sheet1", "A1", "5%").unwrap();
    engine.set_cell_contents("Sheet1", "B1", "=A1*100").unwrap();
    assert_eq!(engine.get_cell_value("Sheet1", "B1"), Value::number(5.0));
}

#[test]
fn array_formulas_spill_and_block() {
    let mut engine = Engine::new();
    engine
        .set_cell_contents("Sheet1", "A1", "{={1,2;3,4}}")
        .unwrap();
    assert_eq!(engine.get_cell_value("Sheet1", "A1"), Value::number(1.0));
    assert_eq!(engine.get_cell_value("Sheet1", "B1"), Value::number(2.0));
    assert_eq!(engine.get_cell_value("Sheet1", "A2"), Value::number(3.0));
    assert_eq!(engine.get_cell_value("Sheet1", "B2"), Value::number(4.0));

    // A blocked rectangle produces a spill error at the corner.
    let mut blocked = Engine::new();
    blocked.set_cell_contents("Sheet1", "B1", "99").unwrap();
    blocked
        .set_cell_contents("Sheet1", "A1", "{={1,2;3,4}}")
        .unwrap();
    match blocked.get_cell_value("Sheet1", "A1") {
        Value::Error(e) => assert_eq!(e.kind, ErrorKind::Spill),
        other => panic!("expected #SPILL!, got {other:?}"),
    }
    assert_eq!(blocked.get_cell_value("Sheet1", "B1"), Value::number(99.0));
}
