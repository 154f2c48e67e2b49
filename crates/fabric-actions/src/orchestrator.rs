//! Fan-out/fan-in execution of one operation across many devices.
//!
//! Every target gets its own task, session and child cancellation token. The
//! tasks report into two channels sized to the number of targets, so no
//! producer can stall on a consumer that has not started draining. A
//! completion task joins every handle and then drops the last senders, which
//! is what lets the drain loop below terminate.

use std::sync::Arc;

use async_trait::async_trait;
use fabric_device::{
    AdapterRegistry, DeviceAdapter, DeviceError, DeviceTarget, Transport, TransportFactory,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{
    ActionError, ActionResult, FanOutReport, OperationError, StepContext, StepFailure,
};

/// Everything a device operation may touch for one device.
pub struct DeviceContext<'a> {
    pub target: &'a DeviceTarget,
    pub adapter: &'a dyn DeviceAdapter,
    pub transport: &'a mut dyn Transport,
    /// Cancelling this token stops only this device.
    pub cancel: &'a CancellationToken,
}

/// The per-device body of a fan-out.
#[async_trait]
pub trait DeviceOperation: Send + Sync + 'static {
    type Output: Send + 'static;

    async fn run(&self, ctx: DeviceContext<'_>) -> Result<Self::Output, StepFailure>;
}

/// A device that completed its operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed<R> {
    pub host: String,
    pub value: R,
}

/// Aggregated outcome of a fan-out, both lists sorted by host.
#[derive(Debug)]
pub struct FanOut<R> {
    pub results: Vec<Completed<R>>,
    pub errors: Vec<OperationError>,
}

impl<R> FanOut<R> {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// The aggregate report, if any device failed.
    pub fn report(&self) -> Option<FanOutReport> {
        (!self.errors.is_empty()).then(|| FanOutReport::from_errors(&self.errors))
    }

    /// Converts to a `Result`, dropping partial results when any device failed.
    pub fn into_result(self) -> ActionResult<Vec<Completed<R>>> {
        match self.report() {
            None => Ok(self.results),
            Some(report) => Err(ActionError::Aggregate { report }),
        }
    }
}

/// Fails with the first target whose model has no registered adapter.
pub fn preflight(registry: &AdapterRegistry, targets: &[DeviceTarget]) -> ActionResult<()> {
    for target in targets {
        registry
            .check_supported(&target.model)
            .map_err(|source| ActionError::Preflight {
                host: target.host.clone(),
                source,
            })?;
    }
    debug!(devices = targets.len(), "Pre-flight passed");
    Ok(())
}

/// Runs device operations against a shared registry and transport factory.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<AdapterRegistry>,
    factory: Arc<dyn TransportFactory>,
}

impl Orchestrator {
    pub fn new(registry: Arc<AdapterRegistry>, factory: Arc<dyn TransportFactory>) -> Self {
        Self { registry, factory }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn preflight(&self, targets: &[DeviceTarget]) -> ActionResult<()> {
        preflight(&self.registry, targets)
    }

    /// Runs `op` once per target and waits for every device.
    ///
    /// A failing device yields one [`OperationError`] tagged with the step
    /// that failed, or with `operation` when the step is untagged; it never
    /// stops its siblings.
    #[instrument(skip_all, fields(operation = operation, devices = targets.len()))]
    pub async fn run_fan_out<O>(
        &self,
        cancel: &CancellationToken,
        targets: &[DeviceTarget],
        operation: &'static str,
        op: Arc<O>,
    ) -> FanOut<O::Output>
    where
        O: DeviceOperation,
    {
        let capacity = targets.len().max(1);
        let (results_tx, mut results_rx) = mpsc::channel::<Completed<O::Output>>(capacity);
        let (errors_tx, mut errors_rx) = mpsc::channel::<OperationError>(capacity);

        let mut handles: Vec<(String, JoinHandle<()>)> = Vec::with_capacity(targets.len());
        for target in targets {
            let target = target.clone();
            let host = target.host.clone();
            let adapter = self.registry.resolve(&target.model);
            let factory = Arc::clone(&self.factory);
            let op = Arc::clone(&op);
            let cancel = cancel.child_token();
            let results_tx = results_tx.clone();
            let errors_tx = errors_tx.clone();

            let handle = tokio::spawn(async move {
                let host = target.host.clone();
                match run_device(&*op, &target, adapter, factory, cancel).await {
                    Ok(value) => {
                        let _ = results_tx.send(Completed { host, value }).await;
                    }
                    Err(failure) => {
                        let step = failure.step.unwrap_or_else(|| operation.to_string());
                        warn!(host = %host, step = %step, error = %failure.error, "Device operation failed");
                        let _ = errors_tx
                            .send(OperationError::new(step, host, failure.error))
                            .await;
                    }
                }
            });
            handles.push((host, handle));
        }
        drop(results_tx);

        let completion = tokio::spawn(async move {
            for (host, handle) in handles {
                if let Err(join_error) = handle.await {
                    let message = if join_error.is_panic() {
                        "device task panicked".to_string()
                    } else {
                        join_error.to_string()
                    };
                    error!(host = %host, message = %message, "Device task did not report");
                    let _ = errors_tx
                        .send(OperationError::new(
                            operation,
                            host,
                            ActionError::task_failed(message),
                        ))
                        .await;
                }
            }
        });

        let mut results = Vec::with_capacity(targets.len());
        let mut errors = Vec::new();
        let (mut results_open, mut errors_open) = (true, true);
        while results_open || errors_open {
            tokio::select! {
                received = results_rx.recv(), if results_open => match received {
                    Some(completed) => results.push(completed),
                    None => results_open = false,
                },
                received = errors_rx.recv(), if errors_open => match received {
                    Some(failure) => errors.push(failure),
                    None => errors_open = false,
                },
            }
        }
        if let Err(e) = completion.await {
            error!(error = %e, "Fan-out completion task failed");
        }

        results.sort_by(|a, b| a.host.cmp(&b.host));
        errors.sort_by(|a, b| a.host.cmp(&b.host).then_with(|| a.operation.cmp(&b.operation)));

        info!(
            succeeded = results.len(),
            failed = errors.len(),
            "Fan-out finished"
        );
        FanOut { results, errors }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Connects, logs in, runs the operation and always closes the session.
async fn run_device<O>(
    op: &O,
    target: &DeviceTarget,
    adapter: Arc<dyn DeviceAdapter>,
    factory: Arc<dyn TransportFactory>,
    cancel: CancellationToken,
) -> Result<O::Output, StepFailure>
where
    O: DeviceOperation,
{
    let mut transport = factory.connect(target).step("Connect")?;
    debug!(host = %target.host, adapter = adapter.name(), "Device task started");

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StepFailure::from(DeviceError::Cancelled)),
        outcome = async {
            transport.login().await.step("Login")?;
            op.run(DeviceContext {
                target,
                adapter: adapter.as_ref(),
                transport: transport.as_mut(),
                cancel: &cancel,
            })
            .await
        } => outcome,
    };

    if let Err(e) = transport.close().await {
        debug!(host = %target.host, error = %e, "Closing session failed");
    }
    outcome
}
