//! Run orchestration: connect, run each step in order, disconnect.
//!
//! # Invariants
//! - Steps run in `CatalogStep` order and stop at the first failure.
//! - Every session handed to `run_session` is disconnected exactly once.

use super::{CatalogError, CatalogService, CatalogSession, CatalogStep};
use crate::config::CatalogConfig;
use crate::report::{RunReport, StepReport};
use crate::store::StoreResult;
use log::{error, info};
use std::time::Instant;
use uuid::Uuid;

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every step succeeded.
    Completed(RunReport),
    /// Connect failed; no step ran and nothing was closed.
    ConnectionFailed(CatalogError),
    /// A step failed; `report` holds the steps that completed before it.
    Aborted {
        report: RunReport,
        error: CatalogError,
    },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Self::Completed(report) | Self::Aborted { report, .. } => Some(report),
            Self::ConnectionFailed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&CatalogError> {
        match self {
            Self::Completed(_) => None,
            Self::ConnectionFailed(error) | Self::Aborted { error, .. } => Some(error),
        }
    }
}

/// Connects with `config` and runs every step.
///
/// A connection failure is reported through the outcome, never raised.
pub fn run_all(config: &CatalogConfig) -> RunOutcome {
    let run_id = Uuid::new_v4();
    let started_at = Instant::now();
    info!(
        "event=run module=service status=start run_id={} target={}",
        run_id,
        config.target_label()
    );

    let outcome = match CatalogSession::connect(config) {
        Ok(session) => run_session_with_id(session, run_id),
        Err(error) => RunOutcome::ConnectionFailed(error),
    };

    let duration_ms = started_at.elapsed().as_millis();
    match &outcome {
        RunOutcome::Completed(report) => info!(
            "event=run module=service status=ok run_id={} steps={} duration_ms={}",
            run_id,
            report.steps.len(),
            duration_ms
        ),
        RunOutcome::ConnectionFailed(error) => error!(
            "event=run module=service status=error run_id={} error_code=connect_failed duration_ms={} error={}",
            run_id, duration_ms, error
        ),
        RunOutcome::Aborted { report, error } => error!(
            "event=run module=service status=error run_id={} error_code=step_failed steps={} duration_ms={} error={}",
            run_id,
            report.steps.len(),
            duration_ms,
            error
        ),
    }
    outcome
}

/// Runs every step on an open session, then disconnects it.
pub fn run_session(session: CatalogSession) -> RunOutcome {
    run_session_with_id(session, Uuid::new_v4())
}

fn run_session_with_id(session: CatalogSession, run_id: Uuid) -> RunOutcome {
    let mut report = RunReport::new(run_id, session.target());
    let result = run_steps(&session, &mut report);

    match session.disconnect() {
        Ok(()) => report.disconnected = true,
        Err(err) => error!(
            "event=run module=service status=error run_id={} error_code=disconnect_failed error={}",
            run_id, err
        ),
    }

    match result {
        Ok(()) => RunOutcome::Completed(report),
        Err(error) => RunOutcome::Aborted { report, error },
    }
}

fn run_steps(session: &CatalogSession, report: &mut RunReport) -> Result<(), CatalogError> {
    let collection = session.collection().map_err(|source| CatalogError::Operation {
        step: CatalogStep::Seed,
        source,
    })?;
    let service = CatalogService::new(collection);

    let run_id = report.run_id;
    report.steps.push(timed(run_id, CatalogStep::Seed, || {
        service.seed().map(StepReport::Seed)
    })?);
    report.steps.push(timed(run_id, CatalogStep::BasicOperations, || {
        service.basic_operations().map(StepReport::BasicOperations)
    })?);
    report.steps.push(timed(run_id, CatalogStep::AdvancedQueries, || {
        service.advanced_queries().map(StepReport::AdvancedQueries)
    })?);
    report.steps.push(timed(run_id, CatalogStep::Aggregations, || {
        service.aggregations().map(StepReport::Aggregations)
    })?);
    report.steps.push(timed(run_id, CatalogStep::Indexing, || {
        service.indexing().map(StepReport::Indexing)
    })?);
    Ok(())
}

fn timed(
    run_id: Uuid,
    step: CatalogStep,
    op: impl FnOnce() -> StoreResult<StepReport>,
) -> Result<StepReport, CatalogError> {
    let started_at = Instant::now();
    info!("event=step module=service status=start run_id={run_id} step={step}");
    match op() {
        Ok(report) => {
            info!(
                "event=step module=service status=ok run_id={} step={} duration_ms={}",
                run_id,
                step,
                started_at.elapsed().as_millis()
            );
            Ok(report)
        }
        Err(source) => {
            error!(
                "event=step module=service status=error run_id={} step={} duration_ms={} error={:?}",
                run_id,
                step,
                started_at.elapsed().as_millis(),
                source
            );
            Err(CatalogError::Operation { step, source })
        }
    }
}

