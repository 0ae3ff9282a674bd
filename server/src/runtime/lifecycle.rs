//! Application lifecycle management and graceful shutdown.
//!
//! 1. **Startup**: spawn the ingestion consumer
//! 2. **Runtime**: serve HTTP
//! 3. **Shutdown**: on Ctrl+C or SIGTERM stop accepting connections,
//!    broadcast shutdown to the consumer and wait for it, bounded by the
//!    configured timeout

use crate::runtime::EventConsumer;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Running application with all background tasks.
pub struct Application {
    /// TCP listener for HTTP server
    listener: tokio::net::TcpListener,

    /// Axum router with all HTTP routes
    router: axum::Router,

    /// Ingestion consumer, absent when disabled by configuration
    consumer: Option<EventConsumer>,

    /// Shutdown signal broadcaster
    shutdown_tx: broadcast::Sender<()>,

    /// How long background tasks get to stop
    shutdown_timeout: Duration,
}

impl Application {
    /// Create a new application instance.
    #[must_use]
    pub const fn new(
        listener: tokio::net::TcpListener,
        router: axum::Router,
        consumer: Option<EventConsumer>,
        shutdown_tx: broadcast::Sender<()>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            listener,
            router,
            consumer,
            shutdown_tx,
            shutdown_timeout,
        }
    }

    /// Address the HTTP server is bound to.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the underlying socket.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run until a shutdown signal arrives, then stop every task.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server fails.
    pub async fn run(self) -> std::io::Result<()> {
        info!(address = ?self.listener.local_addr().ok(), "Starting HTTP server");

        let consumer_handle = self.consumer.map(|consumer| {
            info!("Starting ingestion consumer");
            consumer.spawn()
        });

        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        info!("HTTP server stopped, initiating graceful shutdown...");

        // No receivers left means the consumer already stopped.
        let _ = self.shutdown_tx.send(());

        if let Some(handle) = consumer_handle {
            match tokio::time::timeout(self.shutdown_timeout, handle).await {
                Ok(Ok(())) => info!("Consumer stopped gracefully"),
                Ok(Err(e)) => warn!(error = %e, "Consumer task failed"),
                Err(_) => warn!(timeout = ?self.shutdown_timeout, "Consumer shutdown timed out"),
            }
        }

        info!("Graceful shutdown complete");
        Ok(())
    }
}

/// Wait for Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}
