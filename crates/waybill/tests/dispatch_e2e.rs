//! End-to-end dispatch runs against real folders on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use waybill::context::RunContext;
use waybill::coordinator::DispatchCoordinator;
use waybill::settings::Settings;
use waybill_db::{FilterMode, FolderConfig, WaybillDb};

fn a_line(cust: &str, invoice: &str, date: &str, total: &str) -> String {
    format!("A{:<6}{:<8}{:<6}{:>8}", cust, invoice, date, total)
}

fn b_line(upc: &str, description: &str, qty: &str) -> String {
    format!(
        "B{:<11}{:<25}{:<10}{:>8}{:<2}{:>4}{:>4}{:>8}{:>3}{:<9}",
        upc, description, "VND1", "00000100", "", "0001", qty, "00000199", "", ""
    )
}

struct Harness {
    _root: tempfile::TempDir,
    inbox: PathBuf,
    outbox: PathBuf,
    error_dir: PathBuf,
    settings: Settings,
}

impl Harness {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let inbox = root.path().join("inbox");
        let outbox = root.path().join("outbox");
        let error_dir = root.path().join("errors");
        fs::create_dir_all(&inbox).unwrap();
        fs::create_dir_all(&outbox).unwrap();

        let settings = Settings {
            database_path: root.path().join("waybill.sqlite3"),
            scratch_dir: root.path().join("scratch"),
            error_log_dir: error_dir.clone(),
            lookup_table: None,
            max_workers: 2,
            ..Default::default()
        };

        Self {
            _root: root,
            inbox,
            outbox,
            error_dir,
            settings,
        }
    }

    fn write_lookup(&mut self, json: &str) {
        let path = self._root.path().join("items.json");
        fs::write(&path, json).unwrap();
        self.settings.lookup_table = Some(path);
    }

    async fn open_db(&self) -> WaybillDb {
        WaybillDb::open(&self.settings.database_path).await.unwrap()
    }

    fn coordinator(&self, db: &WaybillDb) -> DispatchCoordinator {
        let ctx = Arc::new(RunContext::build(self.settings.clone()).unwrap());
        DispatchCoordinator::new(db.clone(), ctx)
    }

    fn copy_folder(&self, alias: &str) -> FolderConfig {
        FolderConfig {
            alias: alias.to_string(),
            folder_name: self.inbox.display().to_string(),
            process_backend_copy: true,
            copy_destination: self.outbox.display().to_string(),
            ..Default::default()
        }
    }
}

fn delivered_names(outbox: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(outbox)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn split_with_category_filter_delivers_matching_invoice_only() {
    let mut harness = Harness::new();
    harness.write_lookup(
        r#"{
            "01234567890": { "category": "1" },
            "09876543210": { "category": "5" }
        }"#,
    );

    let db = harness.open_db().await;
    let mut config = harness.copy_folder("store1");
    config.split_edi = true;
    config.split_filter_categories = "1".to_string();
    config.split_filter_mode = FilterMode::Include;
    db.upsert_folder_config(&config).await.unwrap();

    let lines = [
        a_line("111111", "INV00001", "040126", "00010000"),
        b_line("01234567890", "COLA", "0010"),
        a_line("111111", "INV00002", "040126", "00020000"),
        b_line("09876543210", "CIGARETTES", "0005"),
    ]
    .join("\r\n");
    fs::write(harness.inbox.join("batch.edi"), lines).unwrap();

    let summary = harness.coordinator(&db).run().await.unwrap();
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.files_failed, 0);

    // Exactly one split file, containing invoice 1 only.
    assert_eq!(delivered_names(&harness.outbox), vec!["A_batch.inv"]);
    let content = fs::read_to_string(harness.outbox.join("A_batch.inv")).unwrap();
    assert!(content.contains("INV00001"));
    assert!(!content.contains("INV00002"));
}

#[tokio::test]
async fn second_run_skips_unchanged_files_until_resend_flagged() {
    let harness = Harness::new();
    let db = harness.open_db().await;
    let folder_id = db
        .upsert_folder_config(&harness.copy_folder("store1"))
        .await
        .unwrap();

    fs::write(
        harness.inbox.join("batch.edi"),
        a_line("111111", "INV00001", "040126", "00010000"),
    )
    .unwrap();

    let summary = harness.coordinator(&db).run().await.unwrap();
    assert_eq!(summary.files_processed, 1);
    assert_eq!(delivered_names(&harness.outbox), vec!["batch.edi"]);

    // Unchanged content: the second run delivers nothing.
    fs::remove_file(harness.outbox.join("batch.edi")).unwrap();
    let summary = harness.coordinator(&db).run().await.unwrap();
    assert_eq!(summary.files_processed, 0);
    assert_eq!(summary.files_failed, 0);
    assert!(delivered_names(&harness.outbox).is_empty());

    // Resend flag makes the same content eligible again, then clears.
    let records = db.processed_files_for_folder(folder_id).await.unwrap();
    db.set_resend_flag("store1", &records[0].file_checksum, true)
        .await
        .unwrap();

    let summary = harness.coordinator(&db).run().await.unwrap();
    assert_eq!(summary.files_processed, 1);
    assert_eq!(delivered_names(&harness.outbox), vec!["batch.edi"]);

    let records = db.processed_files_for_folder(folder_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].resend_flag);
}

#[tokio::test]
async fn missing_folder_is_disabled_while_others_continue() {
    let harness = Harness::new();
    let db = harness.open_db().await;

    let mut gone = harness.copy_folder("aaa-gone");
    gone.folder_name = harness._root.path().join("no-such-dir").display().to_string();
    db.upsert_folder_config(&gone).await.unwrap();
    db.upsert_folder_config(&harness.copy_folder("bbb-live"))
        .await
        .unwrap();

    fs::write(
        harness.inbox.join("live.edi"),
        a_line("111111", "INV00001", "040126", "00010000"),
    )
    .unwrap();

    let summary = harness.coordinator(&db).run().await.unwrap();
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.files_failed, 1);

    let disabled = db.get_folder_by_alias("aaa-gone").await.unwrap().unwrap();
    assert!(!disabled.enabled);
    let live = db.get_folder_by_alias("bbb-live").await.unwrap().unwrap();
    assert!(live.enabled);

    // The disabled folder left an error log behind.
    let logs: Vec<String> = fs::read_dir(&harness.error_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(logs.iter().any(|name| name.starts_with("aaa-gone_")));
}

#[tokio::test]
async fn minor_validation_findings_produce_consolidated_report() {
    let harness = Harness::new();
    let db = harness.open_db().await;

    let mut config = harness.copy_folder("store1");
    config.process_edi = true;
    config.convert_to_format = "csv".to_string();
    db.upsert_folder_config(&config).await.unwrap();

    let lines = [
        a_line("111111", "INV00001", "040126", "00010000"),
        // Suppressed 8-digit UPC: minor finding, conversion still runs.
        b_line("01234565", "SUPPRESSED ITEM", "0001"),
    ]
    .join("\r\n");
    fs::write(harness.inbox.join("batch.edi"), lines).unwrap();

    let summary = harness.coordinator(&db).run().await.unwrap();
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.files_failed, 0);
    assert!(summary.has_validator_warnings);
    assert_eq!(
        summary.to_string(),
        "1 processed, 0 errors, has EDI validator errors"
    );

    assert_eq!(delivered_names(&harness.outbox), vec!["batch.csv"]);

    let reports: Vec<String> = fs::read_dir(&harness.error_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(reports
        .iter()
        .any(|name| name.starts_with("edi_validator_report_")));
}

#[tokio::test]
async fn runs_are_recorded_in_the_audit_trail() {
    let harness = Harness::new();
    let db = harness.open_db().await;
    db.upsert_folder_config(&harness.copy_folder("store1"))
        .await
        .unwrap();

    fs::write(
        harness.inbox.join("batch.edi"),
        a_line("111111", "INV00001", "040126", "00010000"),
    )
    .unwrap();

    harness.coordinator(&db).run().await.unwrap();

    let runs = db.list_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, waybill_db::RunStatus::Completed);
    assert_eq!(runs[0].files_processed, 1);
    assert!(runs[0].completed_at.is_some());
}
