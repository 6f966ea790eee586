use crate::link::Link;
use crate::utils::runner::spawn_runnables;
use crate::utils::test::packet_collectors::collect_egressors;
use tokio::runtime;

/// A multi-threaded runtime with timers, the kind links are deployed on.
pub fn initialize_runtime() -> runtime::Runtime {
    runtime::Builder::new()
        .threaded_scheduler()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
}

/// Runs a link under test to completion from inside `runtime.block_on`: spawns its runnables
/// along with a collector per egress stream, and returns what each egress stream produced, in
/// egress order. Returns only once every input stream has ended.
pub async fn run_link<Packet: Send + 'static>(link: Link<Packet>) -> Vec<Vec<Packet>> {
    let (mut runnables, egressors) = link;
    let (mut collectors, results) = collect_egressors(egressors);
    runnables.append(&mut collectors);

    for handle in spawn_runnables(runnables) {
        handle.await.expect("link runnable panicked");
    }
    results
        .into_iter()
        .map(|kept| kept.try_iter().collect())
        .collect()
}
