use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{QueryKey, ReportFamily, Variant};

use super::orchestrator::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Resolved(Variant),
    Exhausted,
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    RunStarted {
        run_id: Uuid,
        family: ReportFamily,
        fiscal_year: u16,
        groups: usize,
    },
    GroupStarted {
        group: String,
        entities: usize,
        total: usize,
    },
    KeyFinished {
        group: String,
        current: usize,
        total: usize,
        key: QueryKey,
        outcome: KeyOutcome,
    },
    GroupExported {
        group: String,
        archive: PathBuf,
        rows: usize,
    },
    GroupEmpty {
        group: String,
    },
    FailureLogWritten {
        group: String,
        path: PathBuf,
        entries: usize,
    },
    ExportFailed {
        group: String,
        error: String,
    },
    RunStopped {
        skipped_groups: usize,
    },
    RunFinished(RunSummary),
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

pub fn channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<ProgressSender>,
}

impl ProgressReporter {
    pub fn new(tx: ProgressSender) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub async fn render_progress(mut rx: ProgressReceiver) {
    let mut last_bucket = 0;

    while let Some(event) = rx.recv().await {
        match event {
            ProgressEvent::RunStarted {
                run_id,
                family,
                fiscal_year,
                groups,
            } => {
                tracing::info!(%run_id, %family, fiscal_year, groups, "Extraction started");
            }
            ProgressEvent::GroupStarted {
                group,
                entities,
                total,
            } => {
                last_bucket = 0;
                tracing::info!(group = %group, entities, keys = total, "Group started");
            }
            ProgressEvent::KeyFinished {
                group,
                current,
                total,
                key,
                outcome,
            } => {
                tracing::debug!(
                    group = %group,
                    current,
                    total,
                    key = %key,
                    ?outcome,
                    "Key finished"
                );
                let bucket = progress_bucket(current, total);
                if bucket > last_bucket {
                    last_bucket = bucket;
                    tracing::info!(group = %group, current, total, "{}% done", bucket * 5);
                }
            }
            ProgressEvent::GroupExported {
                group,
                archive,
                rows,
            } => {
                tracing::info!(group = %group, rows, archive = %archive.display(), "Archive saved");
            }
            ProgressEvent::GroupEmpty { group } => {
                tracing::warn!(group = %group, "No data found for group");
            }
            ProgressEvent::FailureLogWritten {
                group,
                path,
                entries,
            } => {
                tracing::info!(
                    group = %group,
                    entries,
                    path = %path.display(),
                    "Failure log saved"
                );
            }
            ProgressEvent::ExportFailed { group, error } => {
                tracing::error!(group = %group, error = %error, "Export failed");
            }
            ProgressEvent::RunStopped { skipped_groups } => {
                tracing::warn!(skipped_groups, "Extraction stopped before completion");
            }
            ProgressEvent::RunFinished(summary) => {
                tracing::info!(
                    run_id = %summary.run_id,
                    groups = summary.groups,
                    keys = summary.keys,
                    rows = summary.rows,
                    failures = summary.failures,
                    archives = summary.archives.len(),
                    export_errors = summary.export_errors,
                    "Extraction finished"
                );
            }
        }
    }
}

fn progress_bucket(current: usize, total: usize) -> usize {
    if total == 0 {
        return 20;
    }
    current.min(total) * 20 / total
}
