//! The ingest-to-delivery loop.
//!
//! One task pulls events from the [`EventSource`], snapshots the subscriber
//! list, filters, and hands each matching target to the [`Deliver`]
//! capability. Persistence and fan-out for an event each run in their own
//! task, so neither a slow store nor a slow subscriber holds back delivery.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use namazu_stream::EventSource;
use namazu_types::{
    passes, DeliveryResult, DeliveryTarget, Event, EventRepository, SubscriptionRepository,
};
use namazu_webhook::Deliver;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;

/// How long `run` waits for outstanding event writes once the loop exits.
pub const WRITE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Totals for one event's fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutSummary {
    pub event_id: String,
    pub delivered: usize,
    pub failed: usize,
}

/// Owns the stream source and drives deliveries.
pub struct Pipeline<S> {
    source: S,
    subscriptions: Arc<dyn SubscriptionRepository>,
    events: Option<Arc<dyn EventRepository>>,
    deliverer: Arc<dyn Deliver>,
}

impl<S: EventSource> Pipeline<S> {
    pub fn new(
        source: S,
        subscriptions: Arc<dyn SubscriptionRepository>,
        deliverer: Arc<dyn Deliver>,
    ) -> Self {
        Self {
            source,
            subscriptions,
            events: None,
            deliverer,
        }
    }

    /// Persist every event to `repository` alongside its fan-out.
    pub fn with_event_repository(mut self, repository: Arc<dyn EventRepository>) -> Self {
        self.events = Some(repository);
        self
    }

    /// Run until `cancel` fires or the source stops.
    ///
    /// Only a failure to start the source is returned as an error. In-flight
    /// deliveries observe `cancel` and are awaited before returning. Pending
    /// writes to the event repository get [`WRITE_DRAIN_TIMEOUT`] to finish and
    /// are dropped after that.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        let mut events = self.source.connect(cancel).await?;
        let mut fan_outs: JoinSet<FanOutSummary> = JoinSet::new();
        let mut writes: JoinSet<()> = JoinSet::new();
        info!("Pipeline started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Pipeline cancelled");
                    break;
                }
                Some(joined) = fan_outs.join_next(), if !fan_outs.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Fan-out task failed");
                    }
                }
                Some(joined) = writes.join_next(), if !writes.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Event persistence task failed");
                    }
                }
                next = events.recv() => match next {
                    Some(event) => {
                        self.persist(&event, &mut writes);
                        self.dispatch(event, cancel, &mut fan_outs).await;
                    }
                    None => {
                        info!("Event stream ended");
                        break;
                    }
                },
            }
        }

        self.source.close().await;
        while let Some(joined) = fan_outs.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Fan-out task failed");
            }
        }
        let drain = async {
            while let Some(joined) = writes.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "Event persistence task failed");
                }
            }
        };
        if tokio::time::timeout(WRITE_DRAIN_TIMEOUT, drain).await.is_err() {
            warn!(pending = writes.len(), "Dropping event writes still pending at shutdown");
            writes.shutdown().await;
        }
        info!("Pipeline stopped");
        Ok(())
    }

    fn persist(&self, event: &Event, writes: &mut JoinSet<()>) {
        let Some(repository) = &self.events else {
            return;
        };
        let repository = Arc::clone(repository);
        let event = event.clone();
        writes.spawn(async move {
            if let Err(e) = repository.create(&event).await {
                warn!(event_id = %event.id, error = %e, "Failed to persist event");
            }
        });
    }

    async fn dispatch(
        &self,
        event: Event,
        cancel: &CancellationToken,
        fan_outs: &mut JoinSet<FanOutSummary>,
    ) {
        let subscriptions = match self.subscriptions.list_all().await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                error!(event_id = %event.id, error = %e, "Failed to list subscriptions, skipping event");
                return;
            }
        };

        let targets: Vec<DeliveryTarget> = subscriptions
            .iter()
            .filter(|subscription| passes(subscription.filter.as_ref(), &event))
            .map(|subscription| subscription.target())
            .collect();

        if targets.is_empty() {
            debug!(event_id = %event.id, severity = event.severity, "No matching subscriptions");
            return;
        }

        let payload = match event.payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(event_id = %event.id, error = %e, "Failed to encode event payload");
                return;
            }
        };

        debug!(
            event_id = %event.id,
            severity = event.severity,
            targets = targets.len(),
            "Dispatching event"
        );
        fan_outs.spawn(fan_out(
            Arc::clone(&self.deliverer),
            cancel.clone(),
            event.id,
            targets,
            payload,
        ));
    }
}

/// Deliver `payload` to every target concurrently and log each outcome.
pub async fn fan_out(
    deliverer: Arc<dyn Deliver>,
    cancel: CancellationToken,
    event_id: String,
    targets: Vec<DeliveryTarget>,
    payload: Bytes,
) -> FanOutSummary {
    let started = Instant::now();
    let mut deliveries: JoinSet<(String, DeliveryResult)> = JoinSet::new();

    for target in targets {
        let deliverer = Arc::clone(&deliverer);
        let cancel = cancel.clone();
        let payload = payload.clone();
        deliveries.spawn(async move {
            let result = deliverer.deliver(&cancel, &target, payload).await;
            (target.subscription_id, result)
        });
    }

    let mut summary = FanOutSummary {
        event_id,
        delivered: 0,
        failed: 0,
    };

    while let Some(joined) = deliveries.join_next().await {
        match joined {
            Ok((subscription_id, result)) if result.success => {
                summary.delivered += 1;
                info!(
                    event_id = %summary.event_id,
                    subscription_id = %subscription_id,
                    url = %result.url,
                    status = result.status_code,
                    retry_count = result.retry_count,
                    elapsed_ms = result.response_time.as_millis() as u64,
                    "Delivered"
                );
            }
            Ok((subscription_id, result)) => {
                summary.failed += 1;
                warn!(
                    event_id = %summary.event_id,
                    subscription_id = %subscription_id,
                    url = %result.url,
                    status = result.status_code,
                    retry_count = result.retry_count,
                    elapsed_ms = result.response_time.as_millis() as u64,
                    error = result.error_message.as_deref().unwrap_or(""),
                    "Delivery failed"
                );
            }
            Err(e) => {
                summary.failed += 1;
                error!(event_id = %summary.event_id, error = %e, "Delivery task failed");
            }
        }
    }

    debug!(
        event_id = %summary.event_id,
        delivered = summary.delivered,
        failed = summary.failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Fan-out complete"
    );
    summary
}
