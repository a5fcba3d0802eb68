use std::{env, sync::Arc};

use log::{info, warn};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::task::JoinSet;

use paramserv::{
    FunctionRegistry, ParameterCollection, ServerBuilder, TrainingSpec, Worker,
    aggregation::builtin, metrics::ServiceStats,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let spec = match env::args().nth(1) {
        Some(path) => TrainingSpec::load(&path)?,
        None => {
            info!("no spec file given, using the default training spec");
            TrainingSpec::default()
        }
    };

    let mut registry = FunctionRegistry::with_builtins();
    registry.register_aggregator(builtin::SGD, builtin::gradient_descent(spec.learning_rate));

    let stats = Arc::new(ServiceStats::new());
    let builder = ServerBuilder::new(registry).instrumentation(stats.clone());

    let model = ParameterCollection::new().with("w", vec![0.0; spec.params]);
    let server = Arc::new(builder.build(&spec.server, model)?);

    let mut rng = match spec.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut workers = JoinSet::new();
    for worker_id in 0..spec.server.workers {
        let target: Vec<f32> = (0..spec.params)
            .map(|_| rng.random_range(-1.0..1.0))
            .collect();

        let worker = Worker::new(worker_id, spec.epochs, move |model: &ParameterCollection| {
            let w = model.get("w").unwrap_or_default();
            let grad = w.iter().zip(&target).map(|(w, t)| w - t).collect();
            ParameterCollection::new().with("w", grad)
        });

        let server = Arc::clone(&server);
        workers.spawn(async move { worker.run(&*server).await });
    }

    while let Some(res) = workers.join_next().await {
        match res? {
            Ok(metrics) => info!("worker done: {metrics:?}"),
            Err(e) => warn!("worker failed: {e}"),
        }
    }

    server.close();
    server.join().await?;

    info!("trained model: {}", server.result());
    info!(
        "aggregations={} ({:?}), broadcasts={} ({:?})",
        stats.aggregations(),
        stats.aggregation_time(),
        stats.broadcasts(),
        stats.broadcast_time()
    );

    Ok(())
}
