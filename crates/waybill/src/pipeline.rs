//! Per-file processing pipeline.
//!
//! validate → split → convert → tweak → rename → send, with the first
//! failing stage marking the whole file as errored. Runs on blocking worker
//! threads; everything it reads is the immutable [`RunContext`].

use crate::context::RunContext;
use crate::dedup::FileCandidate;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use waybill_db::{FolderConfig, DESTINATION_UNUSED};
use waybill_edi::naming::{self, NamingParams};
use waybill_edi::splitter::{SUFFIX_CREDIT, SUFFIX_INVOICE};
use waybill_edi::{
    run_conversion, split, validate, CategoryFilter, ConvertContext, EdiError, EdiFormat,
};
use waybill_send::{
    all_succeeded, CopyBackend, EmailBackend, EmailParams, FtpBackend, FtpParams, SendBackend,
    SendManager, SendOutcome,
};

/// Destinations actually used for a delivered file, as recorded in the ledger.
#[derive(Debug, Clone)]
pub struct DeliveredFile {
    pub copy_destination: String,
    pub ftp_destination: String,
    pub email_destination: String,
}

impl DeliveredFile {
    fn unused() -> Self {
        Self {
            copy_destination: DESTINATION_UNUSED.to_string(),
            ftp_destination: DESTINATION_UNUSED.to_string(),
            email_destination: DESTINATION_UNUSED.to_string(),
        }
    }
}

/// A failed pipeline stage.
///
/// `fatal` marks internal-invariant failures (split reconciliation, zero
/// surviving invoices) that abort the folder instead of being recorded as
/// a per-file error.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub stage: &'static str,
    pub message: String,
    pub fatal: bool,
}

impl FileFailure {
    fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            fatal: false,
        }
    }

    fn fatal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            fatal: true,
        }
    }
}

/// Result of one file's full pipeline.
#[derive(Debug)]
pub struct FileResult {
    /// Minor validator findings, collected for the consolidated report.
    pub warnings: Vec<String>,
    pub outcome: std::result::Result<DeliveredFile, FileFailure>,
}

/// One unit of delivery: either the whole file or one split invoice.
struct WorkItem {
    path: PathBuf,
    prefix: String,
    suffix: &'static str,
}

impl WorkItem {
    fn whole(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            prefix: String::new(),
            suffix: "",
        }
    }
}

/// Run the full pipeline for one classified file.
pub fn process_file(candidate: &FileCandidate, config: &FolderConfig, ctx: &RunContext) -> FileResult {
    let mut warnings = Vec::new();
    let outcome = process_file_inner(candidate, config, ctx, &mut warnings);
    if let Ok(delivered) = &outcome {
        info!(
            file = %candidate.path.display(),
            folder = %config.alias,
            copy = %delivered.copy_destination,
            ftp = %delivered.ftp_destination,
            email = %delivered.email_destination,
            resend = candidate.resend,
            "File processed"
        );
    }
    FileResult { warnings, outcome }
}

fn process_file_inner(
    candidate: &FileCandidate,
    config: &FolderConfig,
    ctx: &RunContext,
    warnings: &mut Vec<String>,
) -> std::result::Result<DeliveredFile, FileFailure> {
    let original_name = candidate.path.display().to_string();
    let stem = candidate
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    // Working area for this file's split/converted intermediates.
    let scratch = ctx.settings.scratch_dir.join(&config.alias).join(&stem);
    fs::create_dir_all(&scratch)
        .map_err(|e| FileFailure::new("prepare", format!("cannot create scratch area: {e}")))?;

    let format = EdiFormat::named(&config.edi_format)
        .map_err(|e| FileFailure::new("configure", e.to_string()))?;

    if config.wants_validation() {
        let report = validate(&candidate.path, &original_name, format)
            .map_err(|e| FileFailure::new("validate", e.to_string()))?;
        warnings.extend(report.warnings.iter().cloned());
        if report.has_errors {
            return Err(FileFailure::new("validate", report.errors.join("; ")));
        }
    }

    let items = if config.split_edi {
        split_into_items(candidate, config, ctx, format, &scratch)?
    } else {
        vec![WorkItem::whole(&candidate.path)]
    };

    let mut delivered: Option<DeliveredFile> = None;
    for item in items {
        if item.suffix == SUFFIX_CREDIT && !config.split_edi_include_credits {
            debug!(file = %item.path.display(), "Credit excluded by folder config");
            continue;
        }
        if item.suffix == SUFFIX_INVOICE && !config.split_edi_include_invoices {
            debug!(file = %item.path.display(), "Invoice excluded by folder config");
            continue;
        }

        let convert_ctx = ConvertContext {
            format,
            output_dir: &scratch,
            lookup: ctx.lookup.as_ref(),
            calc_upc_check_digit: config.calc_upc_check_digit,
        };

        let converted = if config.process_edi && !config.convert_to_format.is_empty() {
            let mut converter = ctx
                .converters
                .create(&config.convert_to_format)
                .map_err(|e| FileFailure::new("configure", e.to_string()))?;
            run_conversion(converter.as_mut(), &item.path, &convert_ctx)
                .map_err(|e| FileFailure::new("convert", e.to_string()))?
        } else {
            item.path.clone()
        };

        let tweaked = if config.tweak_edi {
            // The tweaker registered under the output format name, when one
            // exists; otherwise the no-op.
            let tweaker = ctx
                .tweakers
                .get(&config.convert_to_format)
                .or_else(|_| ctx.tweakers.get("noop"))
                .map_err(|e| FileFailure::new("configure", e.to_string()))?;
            tweaker
                .tweak(&converted, &scratch, &convert_ctx)
                .map_err(|e| FileFailure::new("tweak", e.to_string()))?
        } else {
            converted
        };

        let source_name = tweaked
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| stem.clone());
        let delivery_name = naming::output_name(
            &source_name,
            &NamingParams {
                rename: config.rename_file,
                template: &config.rename_template,
                prepend_date: config.prepend_date_files,
                prefix: &item.prefix,
                suffix: item.suffix,
            },
            Utc::now(),
        );

        let manager = build_send_manager(config, ctx, &delivery_name);
        let outcomes = manager.send_all(&tweaked);
        if !all_succeeded(&outcomes) {
            let message = outcomes
                .iter()
                .filter(|o| !o.success)
                .map(|o| {
                    format!(
                        "{}: {}",
                        o.backend,
                        o.error_message.as_deref().unwrap_or("unknown error")
                    )
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FileFailure::new("send", message));
        }
        delivered = Some(destinations_from(&outcomes));
    }

    // Every item excluded by the invoice/credit flags still marks the file
    // processed, so it is not rediscovered on the next run.
    Ok(delivered.unwrap_or_else(DeliveredFile::unused))
}

fn split_into_items(
    candidate: &FileCandidate,
    config: &FolderConfig,
    ctx: &RunContext,
    format: &EdiFormat,
    scratch: &Path,
) -> std::result::Result<Vec<WorkItem>, FileFailure> {
    let include = config.split_filter_mode == waybill_db::FilterMode::Include;
    let filter = CategoryFilter::new(&config.split_filter_categories, include);

    match split(&candidate.path, scratch, format, &filter, ctx.lookup.as_ref()) {
        // Over the invoice cap: deliver the batch unsplit.
        Ok(descriptors) if descriptors.is_empty() => Ok(vec![WorkItem::whole(&candidate.path)]),
        Ok(descriptors) => Ok(descriptors
            .into_iter()
            .map(|d| WorkItem {
                path: d.output_path,
                prefix: d.filename_prefix,
                suffix: d.filename_suffix,
            })
            .collect()),
        Err(
            err @ (EdiError::SplitReconciliation { .. } | EdiError::NoInvoicesSurvived { .. }),
        ) => Err(FileFailure::fatal("split", err.to_string())),
        Err(err) => Err(FileFailure::new("split", err.to_string())),
    }
}

/// Build the enabled backends for one delivery.
pub fn build_send_manager(config: &FolderConfig, ctx: &RunContext, output_name: &str) -> SendManager {
    let mut backends: Vec<Box<dyn SendBackend>> = Vec::new();

    if config.process_backend_copy {
        backends.push(Box::new(CopyBackend::new(
            &config.copy_destination,
            output_name,
        )));
    }
    if config.process_backend_ftp {
        backends.push(Box::new(FtpBackend::new(
            FtpParams {
                host: config.ftp_server.clone(),
                port: config.ftp_port,
                user: config.ftp_user.clone(),
                password: config.ftp_password.clone(),
                folder: config.ftp_folder.clone(),
            },
            output_name,
        )));
    }
    if config.process_backend_email {
        backends.push(Box::new(EmailBackend::new(
            EmailParams {
                smtp_host: ctx.settings.smtp_host.clone(),
                smtp_port: ctx.settings.smtp_port,
                from: ctx.settings.email_from.clone(),
                to: config.email_to.clone(),
                subject: format!("Invoice dispatch: {output_name}"),
            },
            output_name,
        )));
    }

    SendManager::new(backends)
}

fn destinations_from(outcomes: &[SendOutcome]) -> DeliveredFile {
    let mut delivered = DeliveredFile::unused();
    for outcome in outcomes {
        match outcome.backend {
            "copy" => delivered.copy_destination = outcome.destination.clone(),
            "ftp" => delivered.ftp_destination = outcome.destination.clone(),
            "email" => delivered.email_destination = outcome.destination.clone(),
            _ => {}
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    fn test_context(dir: &Path) -> RunContext {
        let settings = Settings {
            scratch_dir: dir.join("scratch"),
            error_log_dir: dir.join("errors"),
            database_path: dir.join("db.sqlite3"),
            ..Default::default()
        };
        RunContext::build(settings).unwrap()
    }

    fn candidate(path: &Path) -> FileCandidate {
        FileCandidate {
            path: path.to_path_buf(),
            checksum: "feed".to_string(),
            send: true,
            resend: false,
        }
    }

    fn edi_lines() -> String {
        [
            format!("A{:<6}{:<8}{:<6}{:>8}", "123456", "INV00001", "040126", "00010000"),
            format!(
                "B{:<11}{:<25}{:<10}{:>8}{:<2}{:>4}{:>4}{:>8}{:>3}{:<9}",
                "01234567890", "COLA", "VND1", "00000100", "", "0001", "0001", "00000199", "", ""
            ),
        ]
        .join("\r\n")
    }

    #[test]
    fn copy_only_pipeline_delivers_and_reports_destinations() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let inbox = dir.path().join("inbox");
        let outbox = dir.path().join("outbox");
        fs::create_dir_all(&inbox).unwrap();
        fs::create_dir_all(&outbox).unwrap();

        let source = inbox.join("batch.edi");
        fs::write(&source, edi_lines()).unwrap();

        let config = FolderConfig {
            alias: "store1".to_string(),
            folder_name: inbox.display().to_string(),
            process_edi: true,
            convert_to_format: "csv".to_string(),
            process_backend_copy: true,
            copy_destination: outbox.display().to_string(),
            ..Default::default()
        };

        let result = process_file(&candidate(&source), &config, &ctx);
        let delivered = result.outcome.expect("pipeline should succeed");
        assert_eq!(delivered.copy_destination, outbox.display().to_string());
        assert_eq!(delivered.ftp_destination, DESTINATION_UNUSED);
        assert!(outbox.join("batch.csv").exists());
    }

    #[test]
    fn validation_failure_stops_the_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let inbox = dir.path().join("inbox");
        fs::create_dir_all(&inbox).unwrap();

        let source = inbox.join("report.txt");
        fs::write(&source, "This is a text report, not EDI\n").unwrap();

        let config = FolderConfig {
            alias: "store1".to_string(),
            folder_name: inbox.display().to_string(),
            process_edi: true,
            convert_to_format: "csv".to_string(),
            ..Default::default()
        };

        let result = process_file(&candidate(&source), &config, &ctx);
        let failure = result.outcome.expect_err("text file must be rejected");
        assert_eq!(failure.stage, "validate");
        assert!(!failure.fatal);
    }

    #[test]
    fn unknown_converter_is_a_configuration_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let inbox = dir.path().join("inbox");
        fs::create_dir_all(&inbox).unwrap();
        let source = inbox.join("batch.edi");
        fs::write(&source, edi_lines()).unwrap();

        let config = FolderConfig {
            alias: "store1".to_string(),
            process_edi: true,
            convert_to_format: "quickbooks".to_string(),
            ..Default::default()
        };

        let result = process_file(&candidate(&source), &config, &ctx);
        let failure = result.outcome.unwrap_err();
        assert_eq!(failure.stage, "configure");
        assert!(failure.message.contains("quickbooks"));
    }

    #[test]
    fn credits_can_be_excluded_from_split_output() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let inbox = dir.path().join("inbox");
        let outbox = dir.path().join("outbox");
        fs::create_dir_all(&inbox).unwrap();
        fs::create_dir_all(&outbox).unwrap();

        let lines = [
            format!("A{:<6}{:<8}{:<6}{:>8}", "123456", "INV00001", "040126", "00010000"),
            format!(
                "B{:<11}{:<25}{:<10}{:>8}{:<2}{:>4}{:>4}{:>8}{:>3}{:<9}",
                "01234567890", "COLA", "VND1", "00000100", "", "0001", "0001", "00000199", "", ""
            ),
            format!("A{:<6}{:<8}{:<6}{:>8}", "123456", "CRD00001", "040126", "-0005000"),
            format!(
                "B{:<11}{:<25}{:<10}{:>8}{:<2}{:>4}{:>4}{:>8}{:>3}{:<9}",
                "09876543210", "RETURN", "VND1", "00000100", "", "0001", "-001", "00000199", "", ""
            ),
        ]
        .join("\r\n");
        let source = inbox.join("mixed.edi");
        fs::write(&source, lines).unwrap();

        let config = FolderConfig {
            alias: "store1".to_string(),
            split_edi: true,
            split_edi_include_credits: false,
            process_backend_copy: true,
            copy_destination: outbox.display().to_string(),
            ..Default::default()
        };

        let result = process_file(&candidate(&source), &config, &ctx);
        assert!(result.outcome.is_ok());
        assert!(outbox.join("A_mixed.inv").exists());
        assert!(!outbox.join("B_mixed.cr").exists());
    }
}
