use log::info;
use miette::IntoDiagnostic;
use std::sync::Arc;
use std::time::Duration;
use tenso_core::{Clock, HandlerRegistry, build_routes};
use tenso_db::pool::get_pool;
use tenso_worker::config::WorkerConfig;
use tenso_worker::conversion::run_conversion_worker;
use tenso_worker::delivery::run_delivery_worker;
use tenso_worker::gc::run_garbage_collector;
use tenso_worker::observe::PipelineCounters;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> miette::Result<()> {
    env_logger::init();

    let config = WorkerConfig::config().into_diagnostic()?;

    let registry = HandlerRegistry::builtin();
    let routes = Arc::new(build_routes(&config.routes, &registry)?);
    info!("Serving {} routes", routes.len());

    tenso_db::run_migrations()?;
    let pool = get_pool(config.db_pool_size).into_diagnostic()?;

    let clock = Clock::system();
    let cancel = CancellationToken::new();
    let counters = Arc::new(PipelineCounters::default());

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received, letting workers finish their iteration");
                cancel.cancel();
            }
        }
    });

    let poll_interval = Duration::from_secs(config.poll_interval_seconds);
    let mut workers = Vec::new();
    for worker_id in 0..config.conversion_workers {
        workers.push(tokio::task::spawn_blocking({
            let pool = pool.clone();
            let routes = routes.clone();
            let clock = clock.clone();
            let cancel = cancel.clone();
            let counters = counters.clone();
            move || {
                run_conversion_worker(
                    worker_id, pool, routes, clock, poll_interval, cancel, counters,
                )
            }
        }));
    }
    for worker_id in 0..config.delivery_workers {
        workers.push(tokio::task::spawn_blocking({
            let pool = pool.clone();
            let routes = routes.clone();
            let clock = clock.clone();
            let cancel = cancel.clone();
            let counters = counters.clone();
            move || {
                run_delivery_worker(
                    worker_id, pool, routes, clock, poll_interval, cancel, counters,
                )
            }
        }));
    }

    let gc = tokio::spawn(run_garbage_collector(
        pool.clone(),
        Duration::from_secs(config.gc_interval_seconds),
        cancel.clone(),
        counters.clone(),
    ));

    for worker in workers {
        worker.await.into_diagnostic()?;
    }
    gc.await.into_diagnostic()?;

    counters.log_summary();

    Ok(())
}
