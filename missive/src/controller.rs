use std::sync::{Arc, LazyLock};

use missive_common::{Signal, internal, logging};
use missive_queue::{
    DeliveryControl, Dispatcher, QueueConfig, QueueEngine, QueueScheduler,
    QueueStatistics, TransportConfig,
};
use missive_spool::SpoolConfig;
use missive_tracing::traced;
use serde::Deserialize;
use tokio::sync::broadcast;

/// Top-level configuration, as read from `missive.config.ron`
///
/// ```ron
/// Missive(
///     queue: (number_of_mail_per_batch: 20, period_secs: 120),
///     spool: File(path: "/var/spool/missive"),
///     transport: Smtp((host: "smtp.example.com")),
/// )
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Missive {
    #[serde(default)]
    queue: QueueConfig,
    #[serde(default)]
    spool: SpoolConfig,
    #[serde(default)]
    transport: TransportConfig,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

/// The wired-up queue: what producers and operators talk to
#[derive(Debug)]
pub struct Service {
    pub control: Arc<DeliveryControl>,
    pub engine: Arc<QueueEngine>,
    pub scheduler: Arc<QueueScheduler>,
    pub statistics: Option<Arc<QueueStatistics>>,
}

impl Service {
    /// Run the scheduler until `shutdown` fires
    pub async fn serve(&self, shutdown: broadcast::Receiver<Signal>) {
        self.scheduler.serve(shutdown).await
    }
}

#[traced(instrument(level = tracing::Level::TRACE))]
async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(s) => tracing::debug!("Received {s:?}"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(e) => tracing::debug!("Received: {e:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                internal!(level = WARN, "Forced shutdown, the running cycle is abandoned");
                break;
            }
        }
    }

    Ok(())
}

impl Missive {
    /// Resolve environment overrides and wire the store, transport, engine
    /// and scheduler together
    ///
    /// # Errors
    /// - If the spool cannot be prepared
    /// - If the transport cannot be configured
    #[traced(instrument(level = tracing::Level::TRACE, skip_all, err), timing(precision = "ms"))]
    pub async fn build(self) -> anyhow::Result<Service> {
        let queue = self.queue.with_overrides();
        let schedule = queue.schedule();

        let store = self.spool.into_store()?;
        let transport = self.transport.build()?;

        let control = Arc::new(DeliveryControl::new(queue.enabled));
        control.set_capacity(store.count().await?);

        let dispatcher = Dispatcher::new(
            transport.clone(),
            Arc::clone(&control),
            queue.transport_timeout(),
        );

        let mut builder = QueueEngine::builder(store, dispatcher, control.clone())
            .limit(schedule.limit())
            .overflow(queue.overflow);
        let statistics = queue.statistics.then(|| Arc::new(QueueStatistics::new()));
        if let Some(statistics) = &statistics {
            builder = builder.statistics(Arc::clone(statistics));
        }
        let engine = Arc::new(builder.build());

        let scheduler = Arc::new(QueueScheduler::new(Arc::clone(&engine), schedule));
        control.register_schedule(scheduler.handle());

        internal!(
            level = INFO,
            transport = transport.name(),
            queued = control.current_capacity(),
            limit = schedule.limit(),
            interval_secs = schedule.interval().as_secs(),
            delivery_enabled = control.is_enabled(),
            "Notification queue ready"
        );

        Ok(Service {
            control,
            engine,
            scheduler,
            statistics,
        })
    }

    /// Run the queue until SIGINT/SIGTERM
    ///
    /// A cycle that is running when the signal arrives finishes first.
    ///
    /// # Errors
    /// If the queue cannot be built or the signal handlers cannot be installed
    #[traced(instrument(level = tracing::Level::TRACE, skip_all, err), timing(precision = "s"))]
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        internal!("Controller running");

        let service = self.build().await?;

        let ret = tokio::select! {
            () = service.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                Ok(())
            }
            r = shutdown() => {
                r
            }
        };

        internal!(level = INFO, "Shutting down...");

        ret
    }
}
