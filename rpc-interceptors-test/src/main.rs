mod global_deadline;
mod greeter;
mod metadata_transform;
mod report;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::report::Report;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut report = Report::default();

    // Both suites run concurrently; their results print only once both are done.
    let (deadline, metadata) = tokio::join!(global_deadline::run(), metadata_transform::run());
    report.suite("Global Deadline", &deadline);
    report.suite("Metadata Transform", &metadata);

    report.finish();
    Ok(())
}
