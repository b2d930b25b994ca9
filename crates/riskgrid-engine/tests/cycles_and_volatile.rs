use riskgrid_engine::{Config, Engine, ErrorKind, Value};

#[test]
fn mutual_reference_is_a_cycle() {
    let mut engine = Engine::new();
    engine.set_cell_contents("Sheet1", "A1", "=B1").unwrap();
    engine.set_cell_contents("Sheet1", "B1", "=A1").unwrap();

    for cell in ["A1", "B1"] {
        match engine.get_cell_value("Sheet1", cell) {
            Value::Error(e) => assert_eq!(e.kind, ErrorKind::Cycle, "cell {cell}"),
            other => panic!("expected #CYCLE! in {cell}, got {other:?}"),
        }
    }
}

#[test]
fn self_reference_is_a_cycle() {
    let mut engine = Engine::new();
    engine.set_cell_contents("Sheet1", "A1", "=A1+1").unwrap();
    match engine.get_cell_value("Sheet1", "A1") {
        Value::Error(e) => assert_eq!(e.kind, ErrorKind::Cycle),
        other => panic!("expected #CYCLE!, got {other:?}"),
    }
}

#[test]
fn sum_over_range_containing_self_is_a_cycle() {
    let mut engine = Engine::new();
    engine
        .set_cell_contents("Sheet1", "A1", "=SUM(A1:A3)")
        .unwrap();
    match engine.get_cell_value("Sheet1", "A1") {
        Value::Error(e) => assert_eq!(e.kind, ErrorKind::Cycle),
        other => panic!("expected #CYCLE!, got {other:?}"),
    }
}

#[test]
fn cycles_do_not_poison_unrelated_cells() {
    let mut engine = Engine::new();
    engine.set_cell_contents("Sheet1", "A1", "=B1").unwrap();
    engine.set_cell_contents("Sheet1", "B1", "=A1").unwrap();
    engine.set_cell_contents("Sheet1", "D1", "=2+2").unwrap();
    assert_eq!(engine.get_cell_value("Sheet1", "D1"), Value::number(4.0));
}

#[test]
fn breaking_a_cycle_restores_values() {
    let mut engine = Engine::new();
    engine.set_cell_contents("Sheet1", "A1", "=B1").unwrap();
    engine.set_cell_contents("Sheet1", "B1", "=A1").unwrap();

    engine.set_cell_contents("Sheet1", "B1", "5").unwrap();
    assert_eq!(engine.get_cell_value("Sheet1", "A1"), Value::number(5.0));
    assert_eq!(engine.get_cell_value("Sheet1", "B1"), Value::number(5.0));
}

#[test]
fn volatile_cells_recompute_after_unrelated_edits() {
    let mut engine = Engine::with_config(Config {
        seed: 1,
        ..Config::default()
    })
    .unwrap();
    engine.set_cell_contents("Sheet1", "A1", "=RAND()").unwrap();
    engine.set_cell_contents("Sheet1", "B1", "=A1").unwrap();

    let first_a1 = engine.get_cell_value("Sheet1", "A1");
    let first_b1 = engine.get_cell_value("Sheet1", "B1");
    assert_eq!(first_a1, first_b1, "B1 mirrors A1");

    // An edit to an unrelated cell still re-rolls the volatile cell and its
    // dependents.
    engine.set_cell_contents("Sheet1", "C1", "7").unwrap();
    let second_a1 = engine.get_cell_value("Sheet1", "A1");
    let second_b1 = engine.get_cell_value("Sheet1", "B1");
    assert_ne!(first_a1, second_a1, "RAND() re-evaluates on every recompute");
    assert_eq!(second_a1, second_b1, "B1 follows the fresh draw");
}

#[test]
fn rand_stays_in_unit_interval() {
    let mut engine = Engine::new();
    engine.set_cell_contents("Sheet1", "A1", "=RAND()").unwrap();
    for _ in 0..20 {
        engine.set_cell_contents("Sheet1", "B1", "0").unwrap();
        match engine.get_cell_value("Sheet1", "A1") {
            Value::Number(n) => {
                let v = n.val();
                assert!((0.0..1.0).contains(&v), "RAND() out of range: {v}");
            }
            other => panic!("expected a number, got {other:?}"),
        }
    }
}

#[test]
fn randbetween_respects_bounds_and_widens_empty_ranges() {
    let mut engine = Engine::new();
    engine
        .set_cell_contents("Sheet1", "A1", "=RANDBETWEEN(1, 6)")
        .unwrap();
    for _ in 0..20 {
        engine.set_cell_contents("Sheet1", "B1", "0").unwrap();
        match engine.get_cell_value("Sheet1", "A1") {
            Value::Number(n) => {
                let v = n.val();
                assert!(v.fract() == 0.0, "integer expected, got {v}");
                assert!((1.0..=6.0).contains(&v), "out of range: {v}");
            }
            other => panic!("expected a number, got {other:?}"),
        }
    }

    // An empty integer range (0.5, 0.6) widens the upper bound by one.
    engine
        .set_cell_contents("Sheet1", "C1", "=RANDBETWEEN(0.5, 0.6)")
        .unwrap();
    match engine.get_cell_value("Sheet1", "C1") {
        Value::Number(n) => assert_eq!(n.val(), 1.0),
        other => panic!("expected a number, got {other:?}"),
    }
}

#[test]
fn iferror_traps_but_does_not_create_dependencies_on_errors() {
    let mut engine = Engine::new();
    engine.set_cell_contents("Sheet1", "A1", "=1/0").unwrap();
    engine
        .set_cell_contents("Sheet1", "B1", "=IFERROR(A1, 42)")
        .unwrap();
    engine
        .set_cell_contents("Sheet1", "C1", "=IFNA(A1, 42)")
        .unwrap();

    assert_eq!(engine.get_cell_value("Sheet1", "B1"), Value::number(42.0));
    // IFNA only traps #N/A; the division error flows through.
    match engine.get_cell_value("Sheet1", "C1") {
        Value::Error(e) => assert_eq!(e.kind, ErrorKind::DivByZero),
        other => panic!("expected #DIV/0!, got {other:?}"),
    }
}

#[test]
fn error_attribution_names_the_originating_cell() {
    let mut engine = Engine::new();
    engine.set_cell_contents("Sheet1", "A1", "=1/0").unwrap();
    engine.set_cell_contents("Sheet1", "B1", "=A1+1").unwrap();

    match engine.get_cell_value("Sheet1", "B1") {
        Value::Error(e) => {
            assert_eq!(e.kind, ErrorKind::DivByZero);
            let root = e.root.expect("root attribution");
            assert_eq!(root.to_a1(), "A1");
        }
        other => panic!("expected propagated error, got {other:?}"),
    }
}
