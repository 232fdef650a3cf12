//! Structural EDI validation.
//!
//! A file is rejected outright when any non-blank line starts with a
//! character outside {A, B, C}. Recoverable line-item problems (bad or
//! suppressed UPCs) are minor: reported, but the file still converts.

use crate::error::Result;
use crate::record::{is_blank, is_eof_marker, record_type_of, EdiFormat};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Outcome of structural validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub has_errors: bool,
    pub has_minor_errors: bool,
    /// Hard errors, one message per offending line.
    pub errors: Vec<String>,
    /// Minor findings, one message per offending line.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Combined human-readable message for logs and error reports.
    pub fn error_message(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        parts.extend(self.errors.iter().map(String::as_str));
        parts.extend(self.warnings.iter().map(String::as_str));
        parts.join("; ")
    }
}

/// Validate the structure of an EDI file.
///
/// `original_name` is the name reported in messages; the file at `path` may
/// be a staged or split copy with a generated name.
pub fn validate(path: &Path, original_name: &str, format: &EdiFormat) -> Result<ValidationReport> {
    let content = fs::read_to_string(path)?;
    let mut report = ValidationReport::default();

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if is_blank(raw_line) || is_eof_marker(raw_line) {
            continue;
        }

        match record_type_of(raw_line) {
            Some('A') | Some('C') => {}
            Some('B') => check_line_item(raw_line, original_name, line_no, format, &mut report),
            other => {
                report.has_errors = true;
                report.errors.push(format!(
                    "{original_name} line {line_no}: not an EDI record (leading character {:?})",
                    other.unwrap_or(' ')
                ));
            }
        }
    }

    debug!(
        file = original_name,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "EDI validation finished"
    );

    Ok(report)
}

fn check_line_item(
    line: &str,
    original_name: &str,
    line_no: usize,
    format: &EdiFormat,
    report: &mut ValidationReport,
) {
    let upc = format.b.upc_number.of(line);

    if upc.is_empty() {
        report.has_minor_errors = true;
        report
            .warnings
            .push(format!("{original_name} line {line_no}: blank UPC"));
        return;
    }

    if !upc.bytes().all(|b| b.is_ascii_digit()) {
        report.has_minor_errors = true;
        report.warnings.push(format!(
            "{original_name} line {line_no}: unparsable UPC {upc:?}"
        ));
        return;
    }

    if upc.len() == 8 {
        report.has_minor_errors = true;
        report.warnings.push(format!(
            "{original_name} line {line_no}: 8-digit suppressed UPC {upc}"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::test_lines::*;
    use crate::record::STANDARD_FORMAT;
    use std::io::Write;

    fn write_file(lines: &[String]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn clean_file_passes() {
        let file = write_file(&[
            a_line("123456", "INV1", "040126", "00010000"),
            b_line("01234567890", "WIDGET", "0001"),
            c_line("FRT", "FREIGHT", "00000150"),
        ]);
        let report = validate(file.path(), "in.edi", &STANDARD_FORMAT).unwrap();
        assert!(!report.has_errors);
        assert!(!report.has_minor_errors);
        assert!(report.error_message().is_empty());
    }

    #[test]
    fn foreign_leading_character_is_hard_error() {
        let file = write_file(&[
            a_line("123456", "INV1", "040126", "00010000"),
            "Totals: 100.00".to_string(),
        ]);
        let report = validate(file.path(), "in.edi", &STANDARD_FORMAT).unwrap();
        assert!(report.has_errors);
        assert!(report.error_message().contains("line 2"));
    }

    #[test]
    fn blank_lines_and_eof_marker_are_tolerated() {
        let file = write_file(&[
            a_line("123456", "INV1", "040126", "00010000"),
            String::new(),
            "\u{1a}".to_string(),
        ]);
        let report = validate(file.path(), "in.edi", &STANDARD_FORMAT).unwrap();
        assert!(!report.has_errors);
    }

    #[test]
    fn bad_upcs_are_minor_not_fatal() {
        let file = write_file(&[
            a_line("123456", "INV1", "040126", "00010000"),
            b_line("O1234S6789O", "BAD OCR UPC", "0001"),
            b_line("01234565", "SUPPRESSED", "0001"),
            b_line("", "NO UPC", "0001"),
        ]);
        let report = validate(file.path(), "in.edi", &STANDARD_FORMAT).unwrap();
        assert!(!report.has_errors);
        assert!(report.has_minor_errors);
        assert_eq!(report.warnings.len(), 3);
        assert!(report.error_message().contains("suppressed"));
    }
}
