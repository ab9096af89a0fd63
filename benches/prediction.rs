use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use decision_core::explainability::ContributionExplainer;
use decision_core::features::{FeatureMap, FeatureValue};
use decision_core::models::{Model, ModelKind, PredictiveModel};
use ndarray::Array1;
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

const N_FEATURES: usize = 14;

fn create_classification_data(n_rows: usize) -> (DataFrame, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let columns: Vec<Column> = (0..N_FEATURES)
        .map(|i| {
            let values: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect();
            Series::new(format!("feature_{}", i).into(), values).into()
        })
        .collect();

    // Label from the first two features plus noise
    let y: Array1<f64> = (0..n_rows)
        .map(|row| {
            let a = columns[0].f64().unwrap().get(row).unwrap_or(0.0);
            let b = columns[1].f64().unwrap().get(row).unwrap_or(0.0);
            if a + b + rng.gen::<f64>() > 10.5 { 1.0 } else { 0.0 }
        })
        .collect();

    (DataFrame::new(columns).unwrap(), y)
}

fn instance(rng: &mut ChaCha8Rng) -> FeatureMap {
    (0..N_FEATURES)
        .map(|i| (format!("feature_{}", i), FeatureValue::from(rng.gen::<f64>() * 10.0)))
        .collect()
}

fn trained_models() -> Vec<Model> {
    let (df, y) = create_classification_data(1000);
    ModelKind::ALL
        .iter()
        .map(|kind| {
            let mut model = Model::new(*kind);
            assert!(model.train(&df, &y, 0.2).is_success());
            model
        })
        .collect()
}

fn bench_predict(c: &mut Criterion) {
    let models = trained_models();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let x = instance(&mut rng);

    let mut group = c.benchmark_group("predict");
    for model in &models {
        group.bench_with_input(BenchmarkId::new("single", model.kind()), &x, |b, x| {
            b.iter(|| model.predict(black_box(x)).unwrap())
        });
    }
    group.finish();
}

fn bench_predict_batch(c: &mut Criterion) {
    let models = trained_models();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let mut group = c.benchmark_group("predict_batch");
    for size in [10, 100, 1000].iter() {
        let batch: Vec<FeatureMap> = (0..*size).map(|_| instance(&mut rng)).collect();
        for model in &models {
            group.bench_with_input(
                BenchmarkId::new(model.kind().as_str(), size),
                &batch,
                |b, batch| b.iter(|| model.predict_batch(black_box(batch))),
            );
        }
    }
    group.finish();
}

fn bench_contribution(c: &mut Criterion) {
    let models = trained_models();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let x = instance(&mut rng);

    let mut group = c.benchmark_group("contribution");
    group.sample_size(10);
    for model in models {
        let kind = model.kind();
        let model = Arc::new(model);
        let explainer = ContributionExplainer::new(true);
        explainer.create(kind.as_str(), Arc::clone(&model), None);
        let row = model.encode(&x).unwrap();

        group.bench_function(BenchmarkId::new("explain", kind), |b| {
            b.iter(|| explainer.explain(kind.as_str(), black_box(&row), None).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_predict, bench_predict_batch, bench_contribution);
criterion_main!(benches);
