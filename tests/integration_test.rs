//! Integration tests: match synthetic ink shapes end to end and check the
//! correspondences and energies the matcher reports.

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use shapematch::matcher::spline;
use shapematch::{
    match_distance, MatchConfig, MatchError, MatchResult, Nalgebra, Point, ShapeMatcher, TieBreak,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();
}

fn unit_square() -> Vec<Point> {
    vec![
        Point::new(0.0, 0.0),
        Point::new(1.0, 0.0),
        Point::new(1.0, 1.0),
        Point::new(0.0, 1.0),
    ]
}

/// Five points whose shape contexts are all distinct.
fn arrow() -> Vec<Point> {
    vec![
        Point::new(0.0, 0.0),
        Point::new(4.0, 0.0),
        Point::new(4.0, 1.0),
        Point::new(1.0, 3.0),
        Point::new(0.0, 2.0),
    ]
}

/// `shape` scaled by `k` and moved by `(dx, dy)`.
fn place(shape: &[Point], k: f64, dx: f64, dy: f64) -> Vec<Point> {
    shape
        .iter()
        .map(|p| Point::new(k * p.x + dx, k * p.y + dy))
        .collect()
}

/// 40-point spiral stroke of radius up to 200, snapped to integer device
/// units the way a pen digitizer reports them.
fn pen_spiral() -> Vec<Point> {
    let n = 40;
    (0..n)
        .map(|i| {
            let t = i as f64 / (n - 1) as f64;
            let r = 200.0 * (0.4 + 0.6 * t);
            let theta = 1.5 * std::f64::consts::PI * t;
            Point::new((r * theta.cos()).round(), (r * theta.sin()).round())
        })
        .collect()
}

fn identity_pairs(n: usize) -> Vec<(usize, usize)> {
    (0..n).map(|i| (i, i)).collect()
}

fn assert_near_zero(result: &MatchResult, tol: f64) {
    assert!(
        result.bending_energy.abs() < tol,
        "bending energy {:.3e} not ~0",
        result.bending_energy
    );
    assert!(
        result.affine_distortion.abs() < tol,
        "affine distortion {:.3e} not ~0",
        result.affine_distortion
    );
    assert!(
        result.shape_context_cost.abs() < tol,
        "shape context cost {:.3e} not ~0",
        result.shape_context_cost
    );
    assert!(
        result.distance.abs() < tol,
        "distance {:.3e} not ~0",
        result.distance
    );
}

#[test]
fn test_self_match_is_zero() -> anyhow::Result<()> {
    init_tracing();
    let matcher = ShapeMatcher::new(MatchConfig::default())?;

    for shape in [unit_square(), arrow()] {
        let copy = shape.clone();
        let result = matcher.match_shapes(&shape, &copy)?;
        assert_near_zero(&result, 1e-8);
        assert_eq!(result.correspondences, identity_pairs(shape.len()));
        assert_eq!(result.matched_cost, 0.0);
        assert!(result.warp_error < 1e-8, "warp error {}", result.warp_error);
    }
    Ok(())
}

#[test]
fn test_translated_unit_square() -> anyhow::Result<()> {
    init_tracing();
    let square = unit_square();
    let moved: Vec<Point> = square
        .iter()
        .map(|p| Point::new(p.x + 5.0, p.y + 5.0))
        .collect();

    let matcher = ShapeMatcher::new(MatchConfig::default())?;
    let result = matcher.match_shapes(&square, &moved)?;

    assert_eq!(result.correspondences, identity_pairs(4));
    assert_near_zero(&result, 1e-8);

    // Convenience entry point agrees
    let d = match_distance(&square, &moved)?;
    assert!((d - result.distance).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_scaled_and_shifted_arrow() -> anyhow::Result<()> {
    init_tracing();
    let shape = arrow();
    let moved: Vec<Point> = shape
        .iter()
        .map(|p| Point::new(2.0 * p.x + 0.5, 2.0 * p.y - 1.5))
        .collect();

    let matcher = ShapeMatcher::new(MatchConfig::default())?;
    let result = matcher.match_shapes(&shape, &moved)?;
    assert_eq!(result.correspondences, identity_pairs(5));
    assert_near_zero(&result, 1e-8);
    Ok(())
}

#[test]
fn test_pen_scale_self_match() -> anyhow::Result<()> {
    init_tracing();
    let matcher = ShapeMatcher::new(MatchConfig::default())?;
    let shapes = [
        place(&arrow(), 10.0, 1000.0, 2000.0),
        place(&arrow(), 50.0, 5000.0, 10000.0),
        pen_spiral(),
        place(&pen_spiral(), 1.0, 3000.0, 1500.0),
    ];

    for shape in &shapes {
        let result = matcher.match_shapes(shape, shape)?;
        assert_eq!(result.correspondences, identity_pairs(shape.len()));
        assert_near_zero(&result, 1e-8);
        assert!(result.warp_error < 1e-6, "warp error {}", result.warp_error);
    }
    Ok(())
}

#[test]
fn test_pen_scale_translation_and_scale() -> anyhow::Result<()> {
    init_tracing();
    let matcher = ShapeMatcher::new(MatchConfig::default())?;
    let spiral = pen_spiral();

    // Integer device coordinates keep the moved copies exact
    for moved in [
        place(&spiral, 1.0, 1500.0, 800.0),
        place(&spiral, 2.0, 300.0, -400.0),
    ] {
        let result = matcher.match_shapes(&spiral, &moved)?;
        assert_eq!(result.correspondences, identity_pairs(spiral.len()));
        assert_near_zero(&result, 1e-8);
    }

    let arrow = place(&arrow(), 10.0, 1000.0, 2000.0);
    let result = matcher.match_shapes(&arrow, &place(&arrow, 2.0, -700.0, 64.0))?;
    assert_eq!(result.correspondences, identity_pairs(5));
    assert_near_zero(&result, 1e-8);
    Ok(())
}

#[test]
fn test_small_rotation_keeps_correspondence() -> anyhow::Result<()> {
    init_tracing();
    // A few degrees stays inside the 30° angle bins of every arrow context
    let (s, c) = 3.0_f64.to_radians().sin_cos();
    let shape = place(&arrow(), 10.0, 1000.0, 2000.0);
    let rotated: Vec<Point> = arrow()
        .iter()
        .map(|p| Point::new(10.0 * (c * p.x - s * p.y) + 1000.0, 10.0 * (s * p.x + c * p.y) + 2000.0))
        .collect();

    let matcher = ShapeMatcher::new(MatchConfig::default())?;
    let result = matcher.match_shapes(&shape, &rotated)?;
    assert_eq!(result.correspondences, identity_pairs(5));
    assert_near_zero(&result, 1e-8);
    Ok(())
}

#[test]
fn test_rotation_has_low_energy() -> anyhow::Result<()> {
    // Known correspondences: exercise the registration step directly
    let shape = arrow();
    let (s, c) = 40.0_f64.to_radians().sin_cos();
    let rotated: Vec<Point> = shape
        .iter()
        .map(|p| Point::new(0.8 * (c * p.x - s * p.y) - 3.0, 0.8 * (s * p.x + c * p.y) + 1.0))
        .collect();

    let fit = spline::fit(
        &shape,
        &rotated,
        spline::regularization(&shape),
        &Nalgebra::default(),
    )?;
    assert!(fit.bending_energy.abs() < 1e-8, "bending {}", fit.bending_energy);
    assert!(fit.affine_distortion.abs() < 1e-8, "affine {}", fit.affine_distortion);

    // A shear is still affine, but no longer a similarity
    let sheared: Vec<Point> = shape.iter().map(|p| Point::new(p.x + p.y, p.y)).collect();
    let fit = spline::fit(
        &shape,
        &sheared,
        spline::regularization(&shape),
        &Nalgebra::default(),
    )?;
    assert!(fit.bending_energy.abs() < 1e-8, "bending {}", fit.bending_energy);
    assert!(fit.affine_distortion > 0.5, "affine {}", fit.affine_distortion);
    Ok(())
}

#[test]
fn test_four_versus_six_points() -> anyhow::Result<()> {
    init_tracing();
    let four = vec![
        Point::new(0.0, 0.0),
        Point::new(2.0, 0.0),
        Point::new(2.0, 2.0),
        Point::new(0.0, 2.0),
    ];
    let mut six = four.clone();
    six.push(Point::new(1.0, 0.0));
    six.push(Point::new(1.0, 2.0));

    let matcher = ShapeMatcher::new(MatchConfig::default())?;

    // Smaller shape first: dummy rows absorb two of the six columns
    let result = matcher.match_shapes(&four, &six)?;
    assert_eq!(result.correspondences.len(), 4);
    let rows: Vec<usize> = result.correspondences.iter().map(|&(i, _)| i).collect();
    assert_eq!(rows, vec![0, 1, 2, 3]);
    let cols: HashSet<usize> = result.correspondences.iter().map(|&(_, j)| j).collect();
    assert_eq!(cols.len(), 4, "B points matched twice: {:?}", result.correspondences);
    assert!(cols.iter().all(|&j| j < 6));
    assert!(result.distance.is_finite());
    // Dummy descriptors never match real ones for free
    assert!(result.shape_context_cost > 0.0);

    // Larger shape first: two of its rows go to dummy columns
    let result = matcher.match_shapes(&six, &four)?;
    assert_eq!(result.correspondences.len(), 4);
    let cols: HashSet<usize> = result.correspondences.iter().map(|&(_, j)| j).collect();
    assert_eq!(cols, HashSet::from([0, 1, 2, 3]));
    assert!(result.distance.is_finite());
    Ok(())
}

#[test]
fn test_error_cases() {
    init_tracing();
    let matcher = ShapeMatcher::new(MatchConfig::default()).unwrap();
    let square = unit_square();

    assert_eq!(
        matcher.match_shapes(&[], &square).unwrap_err(),
        MatchError::EmptyShape { which: "first" }
    );
    assert_eq!(
        matcher.match_shapes(&square, &[]).unwrap_err(),
        MatchError::EmptyShape { which: "second" }
    );

    // Collinear ink cannot anchor a spline
    let line: Vec<Point> = (0..6).map(|i| Point::new(i as f64, 2.0 * i as f64)).collect();
    assert!(matches!(
        matcher.match_shapes(&line, &line),
        Err(MatchError::SingularSystem { .. })
    ));

    // Two points are not enough for the affine part
    assert!(matches!(
        matcher.match_shapes(&square[..2], &square[..2]),
        Err(MatchError::SingularSystem { points: 2 })
    ));
}

#[test]
fn test_deadline_and_cancellation() {
    init_tracing();
    let config = MatchConfig {
        timeout_ms: Some(0),
        ..Default::default()
    };
    let matcher = ShapeMatcher::new(config).unwrap();
    assert!(matches!(
        matcher.match_shapes(&arrow(), &arrow()),
        Err(MatchError::Timeout { .. })
    ));

    let matcher = ShapeMatcher::new(MatchConfig::default()).unwrap();
    let cancel = AtomicBool::new(true);
    assert_eq!(
        matcher
            .match_shapes_cancellable(&arrow(), &arrow(), &cancel)
            .unwrap_err(),
        MatchError::Cancelled
    );
}

#[test]
fn test_deterministic_and_seeded_jitter() -> anyhow::Result<()> {
    let a = arrow();
    let b = unit_square();

    let matcher = ShapeMatcher::new(MatchConfig::default())?;
    let r1 = matcher.match_shapes(&a, &b)?;
    let r2 = matcher.match_shapes(&a, &b)?;
    assert_eq!(r1.distance, r2.distance);
    assert_eq!(r1.correspondences, r2.correspondences);

    let jittered = ShapeMatcher::new(MatchConfig {
        tie_break: TieBreak::Jitter {
            seed: 2007,
            amplitude: 0.1,
        },
        ..Default::default()
    })?;
    let j1 = jittered.match_shapes(&a, &b)?;
    let j2 = jittered.match_shapes(&a, &b)?;
    assert_eq!(j1.distance, j2.distance);
    assert_eq!(j1.correspondences, j2.correspondences);
    Ok(())
}

#[test]
fn test_noisy_ink() -> anyhow::Result<()> {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(160);
    let noise = Normal::new(0.0, 0.02)?;
    let shape = arrow();
    let matcher = ShapeMatcher::new(MatchConfig::default())?;

    for _ in 0..10 {
        let noisy: Vec<Point> = shape
            .iter()
            .map(|p| Point::new(p.x + noise.sample(&mut rng), p.y + noise.sample(&mut rng)))
            .collect();
        let result = matcher.match_shapes(&shape, &noisy)?;
        assert!(result.distance.is_finite());
        assert!(result.bending_energy > -1e-9, "bending {}", result.bending_energy);
        assert!(result.affine_distortion >= 0.0);
        assert!(result.shape_context_cost >= 0.0);
        assert_eq!(result.correspondences.len(), shape.len());
    }
    Ok(())
}

#[test]
fn test_shared_across_threads() -> anyhow::Result<()> {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ShapeMatcher>();

    let matcher = ShapeMatcher::new(MatchConfig::default())?;
    let templates = vec![unit_square(), arrow()];
    let query: Vec<Point> = arrow().iter().map(|p| Point::new(p.x * 3.0, p.y * 3.0)).collect();

    let sequential: Vec<f64> = templates
        .iter()
        .map(|t| matcher.distance(&query, t))
        .collect::<Result<_, _>>()?;

    let threaded: Vec<f64> = std::thread::scope(|scope| {
        let handles: Vec<_> = templates
            .iter()
            .map(|t| {
                let matcher = &matcher;
                let query = &query;
                scope.spawn(move || matcher.distance(query, t))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("match thread panicked"))
            .collect::<Result<Vec<_>, _>>()
    })?;

    assert_eq!(sequential, threaded);

    let ranked = matcher.rank(&query, &templates);
    assert_eq!(ranked[0].index, 1);
    Ok(())
}
