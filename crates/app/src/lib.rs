//! Stockroom application: service wiring and process lifecycle.

pub mod services;

use std::future::Future;
use std::io;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use stockroom_infra::{
    ActiveSubscriptions, BackgroundEventProcessor, BootstrapError, EventSubscriptionService,
};

pub use services::{AppServices, Inventory};

/// A wired application whose event subscriptions are in place.
#[derive(Debug)]
pub struct Application {
    services: AppServices,
    subscriptions: ActiveSubscriptions,
    processor: BackgroundEventProcessor,
}

impl Application {
    /// Register event subscriptions. An error here must abort startup.
    pub fn bootstrap(services: AppServices) -> Result<Self, BootstrapError> {
        let subscriptions = EventSubscriptionService::new(Arc::new(services.clone())).start()?;
        let processor = BackgroundEventProcessor::from_config(&services.config.events);

        Ok(Self {
            services,
            subscriptions,
            processor,
        })
    }

    pub fn services(&self) -> &AppServices {
        &self.services
    }

    /// Run background tasks until `shutdown` resolves, then stop them.
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let cancel = CancellationToken::new();

        let subscriptions = tokio::spawn(self.subscriptions.hold(cancel.clone()));
        let processor = {
            let processor = self.processor.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { processor.run(cancel).await })
        };

        info!("stockroom running");
        shutdown.await;
        info!("shutting down");
        cancel.cancel();

        let released = subscriptions
            .await
            .context("subscription task failed")?;
        processor.await.context("background processor task failed")?;

        info!(
            released,
            processor_ticks = self.processor.ticks(),
            "shutdown complete"
        );
        Ok(())
    }
}

/// Resolves once ctrl-c (or SIGTERM on unix) is received.
pub async fn shutdown_signal() {
    let ctrl_c = wait_for_shutdown(tokio::signal::ctrl_c());

    #[cfg(unix)]
    let terminate = wait_for_shutdown(async {
        use tokio::signal::unix::{SignalKind, signal};
        signal(SignalKind::terminate())?.recv().await;
        Ok::<(), io::Error>(())
    });

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Resolves when `signal` completes successfully. If `signal` fails, the error is logged
/// and this never resolves.
pub async fn wait_for_shutdown<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            error!(error = %err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await
        }
    }
}
