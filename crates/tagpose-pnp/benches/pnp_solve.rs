use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::{Isometry3, Point2, Point3, Vector3};
use tagpose_core::CameraIntrinsics;
use tagpose_pnp::{IterativePnp, PoseSolver};

type Dataset = (Vec<Point3<f64>>, Vec<Point2<f64>>, CameraIntrinsics);

/// `tags` coplanar squares laid out on a row, viewed from a tilted pose.
fn bundle_dataset(tags: usize) -> Dataset {
    let k = CameraIntrinsics::new(800.0, 800.0, 640.0, 480.0);
    let pose = Isometry3::new(Vector3::new(-0.2, 0.05, 1.5), Vector3::new(0.25, -0.15, 0.05));
    let s = 0.04;

    let mut object = Vec::with_capacity(4 * tags);
    for i in 0..tags {
        let ox = 0.12 * i as f64;
        object.extend([
            Point3::new(ox - s, -s, 0.0),
            Point3::new(ox + s, -s, 0.0),
            Point3::new(ox + s, s, 0.0),
            Point3::new(ox - s, s, 0.0),
        ]);
    }
    let image = object
        .iter()
        .filter_map(|p| k.project(&(pose * p)))
        .collect();
    (object, image, k)
}

fn bench_solve(c: &mut Criterion) {
    let solver = IterativePnp::default();
    let mut group = c.benchmark_group("pnp_solve");
    for &tags in &[1usize, 4, 16] {
        let (object, image, k) = bundle_dataset(tags);
        group.bench_with_input(BenchmarkId::from_parameter(tags), &tags, |b, _| {
            b.iter(|| {
                let _ = black_box(solver.solve(black_box(&object), black_box(&image), &k));
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_solve);
criterion_main!(benches);
