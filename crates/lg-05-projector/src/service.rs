//! Event Projector - stored chain events to loan and passport state

use crate::domain::ProjectionError;
use crate::ports::{ChainEventStore, ProjectionStore};
use lg_shared_types::{
    ChainEvent, ChainEventKind, Clock, LoanDefaultedData, LoanRegisteredData,
    RepaymentRecordedData, StoreError,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Events per pass when a caller passes 0.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Counts from one `run_once` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionReport {
    pub fetched: usize,
    pub registered: usize,
    pub repayments: usize,
    pub defaults: usize,
    /// Unknown event names, marked processed without effect.
    pub ignored: usize,
    /// Registrations of loans absent from the ledger, marked processed
    /// without effect.
    pub unmatched: usize,
}

impl ProjectionReport {
    pub fn processed(&self) -> usize {
        self.registered + self.repayments + self.defaults + self.ignored + self.unmatched
    }
}

/// Event projector.
pub struct EventProjector<E, P>
where
    E: ChainEventStore + ?Sized,
    P: ProjectionStore + ?Sized,
{
    events: Arc<E>,
    projections: Arc<P>,
    clock: Arc<dyn Clock>,
}

impl<E, P> EventProjector<E, P>
where
    E: ChainEventStore + ?Sized,
    P: ProjectionStore + ?Sized,
{
    pub fn new(events: Arc<E>, projections: Arc<P>, clock: Arc<dyn Clock>) -> Self {
        Self {
            events,
            projections,
            clock,
        }
    }

    /// Project up to `batch_size` unprocessed events in id order, stopping at
    /// the first failure.
    pub async fn run_once(&self, batch_size: usize) -> Result<ProjectionReport, ProjectionError> {
        let limit = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        let events = self.events.list_unprocessed(limit).await?;
        let mut report = ProjectionReport {
            fetched: events.len(),
            ..Default::default()
        };

        for event in &events {
            match ChainEventKind::from_name(&event.event_name) {
                Some(kind) => {
                    if !self.apply(kind, event).await? {
                        report.unmatched += 1;
                    } else {
                        match kind {
                            ChainEventKind::LoanRegistered => report.registered += 1,
                            ChainEventKind::RepaymentRecorded => report.repayments += 1,
                            ChainEventKind::LoanDefaulted => report.defaults += 1,
                        }
                    }
                }
                None => {
                    debug!(
                        "[lg-05] Ignoring unknown event {} ({})",
                        event.id, event.event_name
                    );
                    report.ignored += 1;
                }
            }
            self.events.mark_processed(event.id).await?;
        }

        if report.processed() > 0 {
            info!(
                registered = report.registered,
                repayments = report.repayments,
                defaults = report.defaults,
                ignored = report.ignored,
                unmatched = report.unmatched,
                "[lg-05] Projected chain events"
            );
        }
        Ok(report)
    }

    /// Apply one event. `Ok(false)` when it names a registration the ledger
    /// does not hold.
    async fn apply(&self, kind: ChainEventKind, event: &ChainEvent) -> Result<bool, ProjectionError> {
        let now = self.clock.now();
        match kind {
            ChainEventKind::LoanRegistered => {
                let data: LoanRegisteredData = payload(kind, event)?;
                let loan_id = loan_id(kind, event, &data.loan_id)?;
                match self
                    .projections
                    .apply_loan_registered(loan_id, &event.tx_hash, now)
                    .await
                {
                    Ok(()) => {}
                    Err(StoreError::LoanNotFound { .. }) => {
                        warn!(
                            "[lg-05] Registration for unknown loan {} (event {}, tx {})",
                            loan_id, event.id, event.tx_hash
                        );
                        return Ok(false);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            ChainEventKind::RepaymentRecorded => {
                let data: RepaymentRecordedData = payload(kind, event)?;
                let loan_id = loan_id(kind, event, &data.loan_id)?;
                if data.amount_minor <= 0 {
                    return Err(invalid(kind, event, "amount_minor must be positive"));
                }
                if !self
                    .projections
                    .apply_repayment(loan_id, data.amount_minor, now)
                    .await?
                {
                    debug!("[lg-05] Loan {} defaulted, repayment dropped", loan_id);
                }
                let passport = self
                    .projections
                    .refresh_passport_by_loan(loan_id, now)
                    .await?;
                debug!(
                    "[lg-05] Passport {} score {}",
                    passport.borrower_id, passport.credit_score
                );
            }
            ChainEventKind::LoanDefaulted => {
                let data: LoanDefaultedData = payload(kind, event)?;
                let loan_id = loan_id(kind, event, &data.loan_id)?;
                if !self.projections.apply_default(loan_id, now).await? {
                    debug!("[lg-05] Loan {} not active, default ignored", loan_id);
                }
                self.projections
                    .refresh_passport_by_loan(loan_id, now)
                    .await?;
            }
        }
        Ok(true)
    }
}

fn payload<T: DeserializeOwned>(
    kind: ChainEventKind,
    event: &ChainEvent,
) -> Result<T, ProjectionError> {
    serde_json::from_value(event.raw_data.clone())
        .map_err(|e| invalid(kind, event, &e.to_string()))
}

fn loan_id<'a>(
    kind: ChainEventKind,
    event: &ChainEvent,
    raw: &'a str,
) -> Result<&'a str, ProjectionError> {
    let loan_id = raw.trim();
    if loan_id.is_empty() {
        return Err(invalid(kind, event, "missing loan_id"));
    }
    Ok(loan_id)
}

fn invalid(kind: ChainEventKind, event: &ChainEvent, reason: &str) -> ProjectionError {
    ProjectionError::InvalidPayload {
        event_id: event.id.0,
        event: kind.as_str(),
        reason: reason.to_string(),
    }
}
