//! Best-effort audit trail.
//!
//! [`Auditor::record`] only enqueues; a dedicated writer thread owns the
//! [`AuditSink`] and drains a bounded queue, so a slow or failing sink never
//! delays or fails the caller. Sink failures and dropped events are reported
//! on the `gavel::ops` tracing target instead.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use thiserror::Error;

use gavel_store::{AuctionStore, StoreError, now_timestamp};
use gavel_types::{AuditAction, AuditEvent, AuditOutcome, RequestContext, TenantId};

/// Tracing target for operational problems that never surface to callers.
pub const OPS_TARGET: &str = "gavel::ops";

#[derive(Debug, Error)]
pub enum AuditSinkError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditSinkError>;
}

/// Appends to the `audit_events` table of a shared store.
pub struct SqliteAuditSink {
    store: Arc<Mutex<AuctionStore>>,
}

impl SqliteAuditSink {
    pub fn new(store: Arc<Mutex<AuctionStore>>) -> Self {
        Self { store }
    }
}

impl AuditSink for SqliteAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.append_audit_event(event)?;
        Ok(())
    }
}

/// Emits each event as a structured `tracing` record on `gavel::audit`.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
        tracing::info!(
            target: "gavel::audit",
            tenant = %event.tenant_id,
            actor = %event.actor_id,
            action = event.action.as_str(),
            outcome = event.outcome.as_str(),
            resource_type = %event.resource_type,
            resource_id = %event.resource_id,
            details = %event.details,
        );
        Ok(())
    }
}

/// Builder-side view of one audit entry, completed by [`Auditor::record`].
pub struct AuditEntry<'a> {
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    pub resource_type: &'a str,
    pub resource_id: &'a str,
    pub details: serde_json::Value,
}

/// Events waiting for the writer beyond this are dropped and reported.
pub const AUDIT_QUEUE_CAPACITY: usize = 1024;

enum Command {
    Record(AuditEvent),
    Flush(SyncSender<()>),
}

/// Owns the sink on its own thread. Dropping the last handle closes the
/// queue and waits for the writer to drain it.
struct AuditWriter {
    queue: Option<SyncSender<Command>>,
    worker: Option<JoinHandle<()>>,
}

impl AuditWriter {
    fn spawn(sink: Arc<dyn AuditSink>, capacity: usize) -> Self {
        let (queue, commands) = mpsc::sync_channel(capacity);
        match thread::Builder::new()
            .name("gavel-audit".to_owned())
            .spawn(move || drain(sink.as_ref(), &commands))
        {
            Ok(worker) => Self {
                queue: Some(queue),
                worker: Some(worker),
            },
            Err(err) => {
                tracing::error!(target: OPS_TARGET, error = %err, "failed to start audit writer");
                Self {
                    queue: None,
                    worker: None,
                }
            }
        }
    }

    fn enqueue(&self, event: AuditEvent) {
        let Some(queue) = &self.queue else {
            report_dropped(&event, "audit writer not running");
            return;
        };
        let (reason, command) = match queue.try_send(Command::Record(event)) {
            Ok(()) => return,
            Err(TrySendError::Full(command)) => ("audit queue full", command),
            Err(TrySendError::Disconnected(command)) => ("audit writer stopped", command),
        };
        if let Command::Record(event) = command {
            report_dropped(&event, reason);
        }
    }

    /// Wait until everything enqueued so far has reached the sink.
    fn flush(&self) {
        let Some(queue) = &self.queue else {
            return;
        };
        let (done, wait) = mpsc::sync_channel(1);
        if queue.send(Command::Flush(done)).is_err() || wait.recv().is_err() {
            tracing::warn!(target: OPS_TARGET, "audit writer stopped before flush");
        }
    }
}

impl Drop for AuditWriter {
    fn drop(&mut self) {
        drop(self.queue.take());
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::error!(target: OPS_TARGET, "audit writer panicked");
        }
    }
}

fn drain(sink: &dyn AuditSink, commands: &Receiver<Command>) {
    for command in commands {
        match command {
            Command::Record(event) => {
                if let Err(err) = sink.record(&event) {
                    tracing::error!(
                        target: OPS_TARGET,
                        tenant = %event.tenant_id,
                        action = event.action.as_str(),
                        resource_id = %event.resource_id,
                        error = %err,
                        "failed to record audit event"
                    );
                }
            }
            Command::Flush(done) => {
                // The flusher may have given up waiting.
                let _ = done.send(());
            }
        }
    }
}

fn report_dropped(event: &AuditEvent, reason: &str) {
    tracing::error!(
        target: OPS_TARGET,
        tenant = %event.tenant_id,
        action = event.action.as_str(),
        resource_id = %event.resource_id,
        reason,
        "audit event dropped"
    );
}

#[derive(Clone)]
pub struct Auditor {
    writer: Option<Arc<AuditWriter>>,
}

impl Auditor {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self::with_capacity(sink, AUDIT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(sink: Arc<dyn AuditSink>, capacity: usize) -> Self {
        Self {
            writer: Some(Arc::new(AuditWriter::spawn(sink, capacity))),
        }
    }

    pub fn disabled() -> Self {
        Self { writer: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Queue one event for the writer. Never blocks and never fails.
    pub fn record(&self, ctx: &RequestContext, tenant: &TenantId, entry: AuditEntry<'_>) {
        let Some(writer) = &self.writer else {
            return;
        };
        writer.enqueue(AuditEvent {
            tenant_id: tenant.clone(),
            actor_id: ctx.actor.id.clone(),
            action: entry.action,
            outcome: entry.outcome,
            resource_type: entry.resource_type.to_owned(),
            resource_id: entry.resource_id.to_owned(),
            details: entry.details,
            created_at: now_timestamp(),
        });
    }

    /// Block until every event recorded so far has been handed to the sink.
    /// Must not be called while holding a lock the sink needs.
    pub fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush();
        }
    }
}

impl std::fmt::Debug for Auditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auditor")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
