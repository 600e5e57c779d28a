use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lethe::backup::BlobStoreSink;
use lethe::cascade::CascadeOrchestrator;
use lethe::store::{DocStore, StoreClient};
use lethe::workflow::{
    DocJobStore, EraseUserDataStep, ExtractUserDataStep, HttpNotifier, JobStore, NotifyUserStep,
    RequestKind, RetryPolicy, WorkflowStateMachine, WorkflowStep,
};
use lethe::LetheConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lethe=info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = LetheConfig::from_env();

    let client = Arc::new(
        StoreClient::new(&config.store_url(), config.store_api_key.clone())
            .context("creating store client")?,
    );
    client
        .health_check()
        .await
        .context("record store health check")?;

    let store = Arc::new(DocStore::new(Arc::clone(&client), config.page_size));
    let sink = Arc::new(BlobStoreSink::new(config.backup_url.clone()));
    let orchestrator = Arc::new(CascadeOrchestrator::new(store, sink));

    let jobs = Arc::new(DocJobStore::new(Arc::clone(&client)));
    let retry = RetryPolicy::new(
        config.step_max_attempts,
        Duration::from_secs(config.step_retry_delay_secs),
    );

    let mut erase_steps: Vec<Arc<dyn WorkflowStep>> = vec![Arc::new(EraseUserDataStep::new(
        Arc::clone(&orchestrator),
        config.backup_folder.clone(),
    ))];
    let mut export_steps: Vec<Arc<dyn WorkflowStep>> = vec![Arc::new(ExtractUserDataStep::new(
        Arc::clone(&orchestrator),
        config.backup_folder.clone(),
    ))];
    if let Some(url) = &config.notify_url {
        let notifier = Arc::new(HttpNotifier::new(url.clone()));
        erase_steps.push(Arc::new(NotifyUserStep::new(notifier.clone())));
        export_steps.push(Arc::new(NotifyUserStep::new(notifier)));
    }

    let erase_machine = WorkflowStateMachine::new(
        Arc::clone(&jobs) as Arc<dyn JobStore>,
        erase_steps,
        retry.clone(),
    );
    let export_machine =
        WorkflowStateMachine::new(Arc::clone(&jobs) as Arc<dyn JobStore>, export_steps, retry);

    info!(
        "lethe worker started (store={}, backup={})",
        config.store_url(),
        config.backup_url
    );

    loop {
        match jobs.list_runnable().await {
            Ok(batch) => {
                for job in batch {
                    let machine = match job.request_kind() {
                        RequestKind::Erase => &erase_machine,
                        RequestKind::Export => &export_machine,
                    };
                    match machine.run(job.id).await {
                        Ok(outcome) => info!("Job {}: {:?}", job.id, outcome),
                        Err(e) => error!("Job {}: {}", job.id, e),
                    }
                }
            }
            Err(e) => warn!("Failed to poll jobs: {}", e),
        }
        tokio::time::sleep(Duration::from_secs(config.poll_interval_secs)).await;
    }
}
