use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::Point2;
use ringcal_rings::{
    solve_ring_center, CenterSolverParams, ConicMatrix, DirectEllipseFitter, EllipseFitter,
    Homography, RotatedEllipse,
};

const RADII: [f64; 4] = [10.0, 16.0, 24.0, 30.0];

fn projected_family() -> [ConicMatrix; 4] {
    let h = Homography::from_array([
        [1.12, 0.21, 321.0],
        [-0.17, 0.94, 245.0],
        [8e-4, -6e-4, 1.0],
    ]);
    RADII.map(|r| {
        let circle = ConicMatrix::from_ellipse(&RotatedEllipse::circle(
            Point2::new(0.0, 0.0),
            r as f32,
        ));
        let m = h.transform_conic(&circle.m).unwrap();
        let ellipse = ConicMatrix::new(m).to_ellipse().unwrap();
        ConicMatrix::from_ellipse(&ellipse)
    })
}

fn bench_solve(c: &mut Criterion) {
    let conics = projected_family();
    let params = CenterSolverParams::default();
    c.bench_function("solve_ring_center_3_pairs", |b| {
        b.iter(|| black_box(solve_ring_center(black_box(&conics), &RADII, &params)))
    });

    let all_pairs = CenterSolverParams {
        include_innermost: true,
        ..params
    };
    c.bench_function("solve_ring_center_6_pairs", |b| {
        b.iter(|| black_box(solve_ring_center(black_box(&conics), &RADII, &all_pairs)))
    });
}

fn bench_fit(c: &mut Criterion) {
    let points = RotatedEllipse {
        center: Point2::new(120.0, 80.0),
        width: 48.0,
        height: 61.0,
        angle_deg: 27.0,
    }
    .sample_points(150);
    let fitter = DirectEllipseFitter::default();
    c.bench_function("direct_ellipse_fit_150pts", |b| {
        b.iter(|| black_box(fitter.fit(black_box(&points))))
    });
}

criterion_group!(benches, bench_solve, bench_fit);
criterion_main!(benches);
