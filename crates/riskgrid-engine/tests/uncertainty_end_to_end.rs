use riskgrid_engine::{
    CiInterpretation, Config, Engine, ErrorKind, NumberType, RichNumber, Value,
};

fn engine_with_seed(seed: u64) -> Engine {
    Engine::with_config(Config {
        seed,
        ..Config::default()
    })
    .unwrap()
}

#[test]
fn gaussian_sum_adds_means_and_variances() {
    let mut engine = engine_with_seed(1234);
    engine
        .set_cell_contents("Sheet1", "A1", "N(μ=1, σ²=2)")
        .unwrap();
    engine
        .set_cell_contents("Sheet1", "B1", "N(μ=3, σ²=4)")
        .unwrap();
    engine.set_cell_contents("Sheet1", "C1", "=A1+B1").unwrap();

    match engine.get_cell_value("Sheet1", "C1") {
        Value::Number(RichNumber::Gaussian {
            mean,
            variance,
            samples,
        }) => {
            assert!((mean - 4.0).abs() < 0.1, "mean = {mean}");
            assert!((variance - 6.0).abs() < 0.3, "variance = {variance}");
            assert_eq!(samples.unwrap().len(), 10_000);
        }
        other => panic!("expected a Gaussian sum, got {other:?}"),
    }
}

#[test]
fn to_interval_parses_as_lognormal_ci_and_scales() {
    let mut engine = engine_with_seed(7);
    engine.set_cell_contents("Sheet1", "A1", "10 to 20").unwrap();
    engine.set_cell_contents("Sheet1", "B1", "3").unwrap();
    engine.set_cell_contents("Sheet1", "C1", "=A1*B1").unwrap();

    // The ratio hi/lo = 2 triggers the log-normal auto interpretation.
    match engine.get_cell_value("Sheet1", "A1") {
        Value::Number(RichNumber::ConfidenceInterval {
            lo,
            hi,
            interpretation,
            ..
        }) => {
            assert_eq!((lo, hi), (10.0, 20.0));
            assert_eq!(interpretation, CiInterpretation::Auto);
            assert_eq!(
                RichNumber::effective_ci_interpretation(lo, hi, interpretation),
                CiInterpretation::LogNormal
            );
        }
        other => panic!("expected a confidence interval, got {other:?}"),
    }

    // Multiplying by a positive scalar preserves log-normality; the median
    // scales to 3 * sqrt(10 * 20) = 42.43.
    let result = engine.get_cell_value("Sheet1", "C1");
    let number = match &result {
        Value::Number(n) => n,
        other => panic!("expected a distribution, got {other:?}"),
    };
    assert!(
        matches!(
            number.number_type(),
            NumberType::LogNormal | NumberType::Sampled
        ),
        "got {:?}",
        number.number_type()
    );
    let median = match number {
        RichNumber::LogNormal { mu, .. } => mu.exp(),
        RichNumber::Sampled { samples } => {
            let mut sorted = samples.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            sorted[sorted.len() / 2]
        }
        other => panic!("unexpected number {other:?}"),
    };
    let expected = 3.0 * (200.0f64).sqrt();
    assert!(
        (median - expected).abs() < 0.5,
        "median = {median}, expected ≈ {expected}"
    );
}

#[test]
fn division_by_zero_guard() {
    let mut engine = engine_with_seed(0);
    engine.set_cell_contents("Sheet1", "A1", "5").unwrap();
    engine.set_cell_contents("Sheet1", "B1", "0").unwrap();
    engine.set_cell_contents("Sheet1", "C1", "=A1/B1").unwrap();

    match engine.get_cell_value("Sheet1", "C1") {
        Value::Error(e) => assert_eq!(e.kind, ErrorKind::DivByZero),
        other => panic!("expected #DIV/0!, got {other:?}"),
    }
}

#[test]
fn division_by_distribution_spanning_zero_fails_whole_expression() {
    let mut engine = engine_with_seed(99);
    engine
        .set_cell_contents("Sheet1", "A1", "N(μ=1, σ²=1)")
        .unwrap();
    engine
        .set_cell_contents("Sheet1", "B1", "N(μ=0, σ²=1)")
        .unwrap();
    engine.set_cell_contents("Sheet1", "C1", "=A1/B1").unwrap();

    match engine.get_cell_value("Sheet1", "C1") {
        Value::Error(e) => assert_eq!(e.kind, ErrorKind::DivByZero),
        other => panic!("expected #DIV/0!, got {other:?}"),
    }
}

#[test]
fn normal_ci_roundtrip_moments() {
    use riskgrid_engine::arith::ArithContext;
    use riskgrid_engine::dist::{self, SeededRng};
    use riskgrid_engine::value::CiSource;

    let config = Config::default();
    let mut rng = SeededRng::new(2024);
    let mut ctx = ArithContext::new(&config, &mut rng);

    let ci = RichNumber::confidence_interval(
        10.0,
        20.0,
        90.0,
        CiInterpretation::Normal,
        CiSource::Brackets,
    );
    let samples = ctx.samples_of(&ci).unwrap();
    assert_eq!(samples.len(), 10_000);

    let (mean, variance) = dist::fit_normal(&samples);
    assert!((14.7..=15.3).contains(&mean), "mean = {mean}");
    let std_dev = variance.sqrt();
    assert!((2.9..=3.2).contains(&std_dev), "std dev = {std_dev}");
}

#[test]
fn distribution_literal_inside_a_formula() {
    let mut engine = engine_with_seed(5);
    engine
        .set_cell_contents("Sheet1", "A1", "=N(μ=10, σ²=1)+N(μ=20, σ²=2)")
        .unwrap();
    match engine.get_cell_value("Sheet1", "A1") {
        Value::Number(RichNumber::Gaussian {
            mean, variance, ..
        }) => {
            assert!((mean - 30.0).abs() < 0.2, "mean = {mean}");
            assert!((variance - 3.0).abs() < 0.3, "variance = {variance}");
        }
        other => panic!("expected a Gaussian, got {other:?}"),
    }
}

#[test]
fn sampled_literal_mixes_with_scalars() {
    let mut engine = engine_with_seed(11);
    engine.set_cell_contents("Sheet1", "A1", "S(μ=1, σ²=2)").unwrap();
    engine.set_cell_contents("Sheet1", "B1", "=A1*2").unwrap();

    match engine.get_cell_value("Sheet1", "B1") {
        Value::Number(RichNumber::Sampled { samples }) => {
            let n = samples.len() as f64;
            let mean = samples.iter().sum::<f64>() / n;
            assert!((mean - 2.0).abs() < 0.1, "mean = {mean}");
        }
        other => panic!("expected Sampled, got {other:?}"),
    }
}

#[test]
fn one_argument_n_stays_text() {
    let mut engine = engine_with_seed(0);
    engine.set_cell_contents("Sheet1", "A1", "N(1)").unwrap();
    assert_eq!(
        engine.get_cell_value("Sheet1", "A1"),
        Value::Text("N(1)".to_string())
    );
}

#[test]
fn fixed_seed_is_bit_reproducible() {
    let build = || {
        let mut engine = engine_with_seed(77);
        engine
            .set_cell_contents("Sheet1", "A1", "N(μ=1, σ²=2)")
            .unwrap();
        engine
            .set_cell_contents("Sheet1", "B1", "U(0, 1)")
            .unwrap();
        engine.set_cell_contents("Sheet1", "C1", "=A1*B1").unwrap();
        engine
    };
    let a = build();
    let b = build();
    assert_eq!(
        a.get_cell_value("Sheet1", "C1"),
        b.get_cell_value("Sheet1", "C1"),
        "same seed and same inputs must be bit-identical"
    );
}

#[test]
fn sample_length_invariant_holds_through_arithmetic() {
    let mut engine = Engine::with_config(Config {
        sample_size: 500,
        seed: 3,
        ..Config::default()
    })
    .unwrap();
    engine
        .set_cell_contents("Sheet1", "A1", "N(μ=0, σ²=1)")
        .unwrap();
    engine.set_cell_contents("Sheet1", "B1", "=A1+1").unwrap();
    engine.set_cell_contents("Sheet1", "C1", "=A1*A1").unwrap();

    for cell in ["A1", "B1", "C1"] {
        match engine.get_cell_value("Sheet1", cell) {
            Value::Number(
                RichNumber::Gaussian {
                    samples: Some(samples),
                    ..
                }
                | RichNumber::Sampled { samples },
            ) => {
                assert_eq!(samples.len(), 500, "cell {cell}");
            }
            other => panic!("expected a sampled distribution in {cell}, got {other:?}"),
        }
    }
}

#[test]
fn distribution_rendering() {
    let mut engine = engine_with_seed(42);
    engine
        .set_cell_contents("Sheet1", "A1", "CI[10, 20]")
        .unwrap();
    assert_eq!(
        engine.get_cell_display("Sheet1", "A1"),
        Some("CI[10, 20]".to_string())
    );

    engine
        .set_cell_contents("Sheet1", "B1", "N(μ=4, σ²=6)")
        .unwrap();
    assert_eq!(
        engine.get_cell_display("Sheet1", "B1"),
        Some("N(μ=4.00, σ²=6.00)".to_string())
    );

    assert_eq!(engine.get_cell_display("Sheet1", "Z99"), None);
}
