//! Per-run orchestration.
//!
//! A background hashing stage walks the folders in alias order, producing
//! one batch of classified files per folder over a bounded channel. The
//! coordinator consumes batches in the same order (a mismatch means the
//! pipeline is corrupt and fails the run), processes each folder's files on
//! a bounded blocking pool, and writes that folder's ledger entries only
//! after every one of its tasks has completed.

use crate::context::RunContext;
use crate::dedup::{classify_files, FileCandidate, FolderLedger};
use crate::discover::{discover_files, resolve_folder_target};
use crate::error::{DispatchError, Result};
use crate::errorlog::{write_validator_report, FolderErrorLog};
use crate::hash::hash_file;
use crate::pipeline::{process_file, DeliveredFile};
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use waybill_db::{FolderConfig, ProcessedFileRecord, WaybillDb};
use waybill_send::{EmailBackend, EmailParams, SendBackend};

/// Batches in flight between the hashing stage and the folder loop.
const BATCH_QUEUE_DEPTH: usize = 2;

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub files_processed: u64,
    pub files_failed: u64,
    pub has_validator_warnings: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} errors",
            self.files_processed, self.files_failed
        )?;
        if self.has_validator_warnings {
            write!(f, ", has EDI validator errors")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RunCounters {
    processed: u64,
    failed: u64,
}

/// One folder's discovery/hash/dedup results, produced by the hashing stage.
struct FolderBatch {
    folder_id: i64,
    alias: String,
    /// Locally visible target no longer exists.
    missing: bool,
    /// Discovery or staging failed for the whole folder.
    stage_error: Option<String>,
    candidates: Vec<FileCandidate>,
    /// Files whose hashing failed after retries.
    file_errors: Vec<(PathBuf, String)>,
}

/// Runs one dispatch cycle over all active folders.
pub struct DispatchCoordinator {
    db: WaybillDb,
    ctx: Arc<RunContext>,
}

impl DispatchCoordinator {
    pub fn new(db: WaybillDb, ctx: Arc<RunContext>) -> Self {
        Self { db, ctx }
    }

    /// Execute one run, recording its run record and returning the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let run_id = self.db.create_run().await?;
        let mut counters = RunCounters::default();
        let mut validator_warnings: Vec<String> = Vec::new();

        match self
            .run_folders(&mut counters, &mut validator_warnings)
            .await
        {
            Ok(()) => {
                let summary = RunSummary {
                    files_processed: counters.processed,
                    files_failed: counters.failed,
                    has_validator_warnings: !validator_warnings.is_empty(),
                };
                self.db
                    .complete_run(run_id, counters.processed, counters.failed)
                    .await?;
                info!(summary = %summary, "Dispatch run complete");
                Ok(summary)
            }
            Err(err) => {
                error!(error = %err, "Dispatch run failed");
                if let Err(db_err) = self
                    .db
                    .fail_run(run_id, counters.processed, counters.failed, &err.to_string())
                    .await
                {
                    error!(error = %db_err, "Could not finalize run record");
                }
                Err(err)
            }
        }
    }

    async fn run_folders(
        &self,
        counters: &mut RunCounters,
        validator_warnings: &mut Vec<String>,
    ) -> Result<()> {
        let folders = self.db.list_active_folder_configs().await?;
        if folders.is_empty() {
            info!("No active folders configured");
            return Ok(());
        }

        // One ledger snapshot per run; the hashing stage classifies against it.
        let ledgers = self.load_folder_ledgers(&folders).await?;

        let (batch_tx, mut batch_rx) = mpsc::channel::<FolderBatch>(BATCH_QUEUE_DEPTH);
        let producer = tokio::spawn(hash_stage(
            folders.clone(),
            ledgers,
            self.ctx.clone(),
            batch_tx,
        ));

        let mut queued_reports: Vec<PathBuf> = Vec::new();
        let mut loop_result: Result<()> = Ok(());

        for folder in &folders {
            let Some(batch) = batch_rx.recv().await else {
                loop_result = Err(DispatchError::HashStageDied(folder.alias.clone()));
                break;
            };
            // The hashing stage must serve folders in exactly the order we
            // iterate them; anything else is pipeline corruption.
            if batch.folder_id != folder.id {
                loop_result = Err(DispatchError::FolderDesync {
                    expected: folder.alias.clone(),
                    got: batch.alias,
                });
                break;
            }

            if let Err(err) = self
                .process_folder(folder, batch, counters, validator_warnings, &mut queued_reports)
                .await
            {
                loop_result = Err(err);
                break;
            }
        }

        // Stop the producer before finishing (normally it is already done).
        drop(batch_rx);
        let _ = producer.await;

        if !validator_warnings.is_empty() {
            match write_validator_report(
                &self.ctx.settings.error_log_dir,
                validator_warnings.as_slice(),
                Utc::now(),
            ) {
                Ok(path) => {
                    info!(
                        path = %path.display(),
                        findings = validator_warnings.len(),
                        "EDI validator report written"
                    );
                    if self.ctx.settings.email_error_logs {
                        queued_reports.push(path);
                    }
                }
                Err(err) => warn!(error = %err, "Could not write validator report"),
            }
        }

        self.email_queued_reports(queued_reports).await;
        loop_result
    }

    async fn load_folder_ledgers(
        &self,
        folders: &[FolderConfig],
    ) -> Result<HashMap<i64, FolderLedger>> {
        let records = self.db.list_processed_files().await?;
        let mut grouped: HashMap<i64, Vec<ProcessedFileRecord>> = HashMap::new();
        for record in records {
            grouped.entry(record.folder_id).or_default().push(record);
        }

        let mut ledgers = HashMap::new();
        for folder in folders {
            let slice = grouped.remove(&folder.id).unwrap_or_default();
            ledgers.insert(folder.id, FolderLedger::from_records(&slice));
        }
        Ok(ledgers)
    }

    async fn process_folder(
        &self,
        folder: &FolderConfig,
        batch: FolderBatch,
        counters: &mut RunCounters,
        validator_warnings: &mut Vec<String>,
        queued_reports: &mut Vec<PathBuf>,
    ) -> Result<()> {
        if batch.missing {
            warn!(
                folder = %folder.alias,
                path = %folder.folder_name,
                "Target folder no longer exists, disabling"
            );
            self.db.set_folder_enabled(folder.id, false).await?;
            counters.failed += 1;
            let mut log = FolderErrorLog::new(&folder.alias);
            log.push(
                &folder.folder_name,
                "discover",
                "target folder does not exist; folder disabled",
            );
            self.write_error_log(&log, queued_reports);
            return Ok(());
        }

        if let Some(message) = batch.stage_error {
            counters.failed += 1;
            let mut log = FolderErrorLog::new(&folder.alias);
            log.push(&folder.folder_name, "discover", message);
            self.write_error_log(&log, queued_reports);
            return Ok(());
        }

        let mut error_log = FolderErrorLog::new(&folder.alias);
        for (path, message) in &batch.file_errors {
            counters.failed += 1;
            error_log.push(path.display().to_string(), "hash", message.clone());
        }

        let skipped = batch.candidates.iter().filter(|c| !c.send).count();
        let to_process: Vec<FileCandidate> =
            batch.candidates.into_iter().filter(|c| c.send).collect();
        info!(
            folder = %folder.alias,
            files = to_process.len(),
            skipped,
            "Processing folder"
        );

        let mut successes: Vec<(FileCandidate, DeliveredFile)> = Vec::new();
        let mut fatal: Option<(String, String)> = None;

        let max_workers = self.ctx.settings.max_workers.max(1);
        let mut pending = to_process.into_iter();
        let mut tasks = JoinSet::new();

        loop {
            while tasks.len() < max_workers {
                let Some(candidate) = pending.next() else { break };
                let config = folder.clone();
                let ctx = self.ctx.clone();
                tasks.spawn_blocking(move || {
                    let result = process_file(&candidate, &config, &ctx);
                    (candidate, result)
                });
            }

            let Some(joined) = tasks.join_next().await else { break };
            match joined {
                Ok((candidate, result)) => {
                    validator_warnings.extend(result.warnings);
                    match result.outcome {
                        Ok(delivered) => successes.push((candidate, delivered)),
                        Err(failure) => {
                            counters.failed += 1;
                            let file = candidate.path.display().to_string();
                            error_log.push(file.clone(), failure.stage, failure.message.clone());
                            if failure.fatal && fatal.is_none() {
                                fatal = Some((file, failure.message));
                            }
                        }
                    }
                }
                Err(join_err) => {
                    counters.failed += 1;
                    error_log.push("<unknown>", "process", format!("worker task failed: {join_err}"));
                }
            }
        }
        // Barrier: every task for this folder has completed.

        if let Some((file, message)) = fatal {
            // Internal invariant broken: leave the folder's ledger untouched
            // and fail the run.
            if !error_log.is_empty() {
                self.write_error_log(&error_log, queued_reports);
            }
            return Err(DispatchError::FolderAborted {
                alias: folder.alias.clone(),
                file,
                message,
            });
        }

        for (candidate, delivered) in &successes {
            let record = ProcessedFileRecord {
                file_name: candidate.path.display().to_string(),
                folder_id: folder.id,
                folder_alias: folder.alias.clone(),
                file_checksum: candidate.checksum.clone(),
                sent_date_time: Utc::now(),
                copy_destination: delivered.copy_destination.clone(),
                ftp_destination: delivered.ftp_destination.clone(),
                email_destination: delivered.email_destination.clone(),
                resend_flag: false,
            };
            self.db.record_processed_file(&record).await?;
            counters.processed += 1;
        }

        let pruned = self.db.trim_processed_files(folder.id).await?;
        if pruned > 0 {
            info!(folder = %folder.alias, pruned, "Ledger retention applied");
        }

        if !error_log.is_empty() {
            self.write_error_log(&error_log, queued_reports);
        }
        Ok(())
    }

    fn write_error_log(&self, log: &FolderErrorLog, queued_reports: &mut Vec<PathBuf>) {
        match log.write(&self.ctx.settings.error_log_dir, Utc::now()) {
            Ok(path) => {
                warn!(
                    folder = %log.alias(),
                    errors = log.len(),
                    path = %path.display(),
                    "Folder errors recorded"
                );
                if self.ctx.settings.email_error_logs {
                    queued_reports.push(path);
                }
            }
            Err(err) => error!(
                folder = %log.alias(),
                error = %err,
                "Could not write folder error log"
            ),
        }
    }

    /// Send queued error logs and reports to the admin recipients.
    async fn email_queued_reports(&self, reports: Vec<PathBuf>) {
        if reports.is_empty() {
            return;
        }
        let settings = self.ctx.settings.clone();
        if !settings.smtp_configured() || settings.admin_recipients.trim().is_empty() {
            warn!(
                reports = reports.len(),
                "Error reports queued for email but no mail relay is configured"
            );
            return;
        }

        let sent = tokio::task::spawn_blocking(move || {
            let mut sent = 0usize;
            for path in reports {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "report.log".to_string());
                let backend = EmailBackend::new(
                    EmailParams {
                        smtp_host: settings.smtp_host.clone(),
                        smtp_port: settings.smtp_port,
                        from: settings.email_from.clone(),
                        to: settings.admin_recipients.clone(),
                        subject: format!("Waybill report: {name}"),
                    },
                    name.clone(),
                );
                // One attempt only; reports skip the delivery retry schedule.
                match backend.send_once(&path) {
                    Ok(()) => sent += 1,
                    Err(err) => warn!(report = %name, error = %err, "Could not email report"),
                }
            }
            sent
        })
        .await
        .unwrap_or(0);

        if sent > 0 {
            info!(sent, "Error reports emailed");
        }
    }
}

/// Background producer: discovery + hashing + dedup per folder, one batch
/// per folder in the coordinator's iteration order.
async fn hash_stage(
    folders: Vec<FolderConfig>,
    mut ledgers: HashMap<i64, FolderLedger>,
    ctx: Arc<RunContext>,
    tx: mpsc::Sender<FolderBatch>,
) {
    for folder in folders {
        let ledger = ledgers.remove(&folder.id).unwrap_or_default();
        let scratch = ctx.settings.scratch_dir.clone();
        let config = folder.clone();
        let batch = match tokio::task::spawn_blocking(move || {
            build_folder_batch(&config, &ledger, &scratch)
        })
        .await
        {
            Ok(batch) => batch,
            Err(join_err) => FolderBatch {
                folder_id: folder.id,
                alias: folder.alias.clone(),
                missing: false,
                stage_error: Some(format!("hashing task failed: {join_err}")),
                candidates: Vec::new(),
                file_errors: Vec::new(),
            },
        };

        // Consumer hanging up means the run is over.
        if tx.send(batch).await.is_err() {
            break;
        }
    }
}

fn build_folder_batch(folder: &FolderConfig, ledger: &FolderLedger, scratch: &Path) -> FolderBatch {
    let mut batch = FolderBatch {
        folder_id: folder.id,
        alias: folder.alias.clone(),
        missing: false,
        stage_error: None,
        candidates: Vec::new(),
        file_errors: Vec::new(),
    };

    let target = match resolve_folder_target(folder, scratch) {
        Ok(Some(dir)) => dir,
        Ok(None) => {
            batch.missing = true;
            return batch;
        }
        Err(err) => {
            batch.stage_error = Some(err.to_string());
            return batch;
        }
    };

    let files = match discover_files(&target) {
        Ok(files) => files,
        Err(err) => {
            batch.stage_error = Some(format!("cannot list folder: {err}"));
            return batch;
        }
    };

    let mut hashed = Vec::new();
    for path in files {
        match hash_file(&path) {
            Ok(digest) => hashed.push((path, digest)),
            Err(err) => batch
                .file_errors
                .push((path, format!("hashing failed after retries: {err}"))),
        }
    }

    batch.candidates = classify_files(hashed, ledger);
    batch
}
