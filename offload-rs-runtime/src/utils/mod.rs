/// Spawning and running built links on a tokio runtime.
pub mod runner;

/// Harness, stream generators and collectors for exercising links in tests.
pub mod test;
