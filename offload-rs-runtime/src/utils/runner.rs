use crate::link::{Link, TokioRunnable};
use crate::utils::test::packet_collectors::collect_egressors;
use tokio::runtime;
use tokio::task::JoinHandle;

/// Spawns every runnable onto the current tokio runtime.
pub fn spawn_runnables(runnables: Vec<TokioRunnable>) -> Vec<JoinHandle<()>> {
    runnables.into_iter().map(tokio::spawn).collect()
}

/// Runs a pipeline to completion on a fresh multi-threaded runtime.
///
/// `link_builder` is called from inside the runtime and returns the master link. A deployed
/// pipeline's master link holds only runnables, since every output leaves through an egress
/// link. Any egress streams it does return are collected and handed back once all runnables
/// finish, which only happens when every input ends.
pub fn runner<OutputPacket, F>(link_builder: F) -> Vec<Vec<OutputPacket>>
where
    OutputPacket: Send + 'static,
    F: FnOnce() -> Link<OutputPacket>,
{
    let mut runtime = runtime::Builder::new()
        .threaded_scheduler()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");

    runtime.block_on(async {
        let (mut runnables, egressors) = link_builder();
        let (mut collectors, results) = collect_egressors(egressors);
        runnables.append(&mut collectors);

        for handle in spawn_runnables(runnables) {
            if let Err(err) = handle.await {
                panic!("pipeline runnable failed: {}", err);
            }
        }
        results
            .into_iter()
            .map(|kept| kept.try_iter().collect())
            .collect()
    })
}
