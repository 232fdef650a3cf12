//! Splits a multi-invoice EDI file into one file per invoice.
//!
//! The source is streamed once. Each A record closes the previous invoice
//! (writing its buffered, category-filtered B lines and its C lines) and
//! opens the next output file. Invoices left without line items after
//! filtering are dropped and their files deleted. Split output always uses
//! CRLF line endings.

use crate::error::{EdiError, Result};
use crate::record::{is_blank, is_eof_marker, record_type_of, EdiFormat, EdiRecord};
use crate::CategoryLookup;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Files with more invoice headers than this are left unsplit.
pub const MAX_INVOICES_PER_FILE: usize = 700;

/// Filename suffix for a regular invoice.
pub const SUFFIX_INVOICE: &str = ".inv";
/// Filename suffix for a credit (negative invoice total).
pub const SUFFIX_CREDIT: &str = ".cr";

/// One surviving invoice extracted from the source file.
#[derive(Debug, Clone)]
pub struct SplitDescriptor {
    pub output_path: PathBuf,
    /// Excel-style column letters for the invoice's ordinal position.
    pub filename_prefix: String,
    /// ".inv" or ".cr".
    pub filename_suffix: &'static str,
}

/// Line-item category filter applied per invoice before flushing.
///
/// Items whose UPC is absent from the lookup table are always kept, so an
/// incomplete table never silently drops unknown inventory.
#[derive(Debug, Clone)]
pub struct CategoryFilter {
    categories: Option<HashSet<String>>,
    include: bool,
}

impl CategoryFilter {
    /// Build a filter from the folder config fields.
    ///
    /// `categories` is "ALL" (no filtering) or a comma-separated list;
    /// `include` selects whether listed categories survive or are removed.
    pub fn new(categories: &str, include: bool) -> Self {
        let spec = categories.trim();
        if spec.is_empty() || spec.eq_ignore_ascii_case("ALL") {
            return Self {
                categories: None,
                include,
            };
        }
        let set = spec
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        Self {
            categories: Some(set),
            include,
        }
    }

    /// Keep-everything filter.
    pub fn all() -> Self {
        Self {
            categories: None,
            include: true,
        }
    }

    /// Whether a line item with the given category survives.
    pub fn keeps(&self, category: Option<&str>) -> bool {
        let Some(set) = &self.categories else {
            return true;
        };
        let Some(category) = category else {
            // Unknown item: fail open.
            return true;
        };
        if self.include {
            set.contains(category)
        } else {
            !set.contains(category)
        }
    }
}

/// Split `path` into per-invoice files under `scratch_dir`.
///
/// Returns one descriptor per surviving invoice, or an empty list when the
/// file exceeds [`MAX_INVOICES_PER_FILE`] headers and is left unsplit.
pub fn split(
    path: &Path,
    scratch_dir: &Path,
    format: &EdiFormat,
    filter: &CategoryFilter,
    lookup: &dyn CategoryLookup,
) -> Result<Vec<SplitDescriptor>> {
    let file_name = path.display().to_string();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "edi".to_string());

    let content = fs::read_to_string(path)?;
    fs::create_dir_all(scratch_dir)?;

    let mut descriptors: Vec<SplitDescriptor> = Vec::new();
    let mut current: Option<OpenInvoice> = None;
    let mut invoice_count = 0usize;
    let mut lines_read = 0usize;
    let mut lines_written = 0usize;
    let mut lines_dropped = 0usize;

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if is_blank(raw_line) || is_eof_marker(raw_line) {
            continue;
        }
        let line = raw_line.trim_end_matches('\r');
        lines_read += 1;

        match record_type_of(line) {
            Some('A') => {
                if let Some(invoice) = current.take() {
                    flush_invoice(
                        invoice,
                        filter,
                        lookup,
                        &mut descriptors,
                        &mut lines_written,
                        &mut lines_dropped,
                    )?;
                }

                if invoice_count == MAX_INVOICES_PER_FILE {
                    // Pathological batch: undo everything and leave the
                    // source unsplit.
                    warn!(
                        file = %file_name,
                        limit = MAX_INVOICES_PER_FILE,
                        "Too many invoices in one file, skipping split"
                    );
                    for descriptor in &descriptors {
                        let _ = fs::remove_file(&descriptor.output_path);
                    }
                    return Ok(Vec::new());
                }

                let header = match format.parse_line(line, &file_name, line_no)? {
                    EdiRecord::Header(a) => a,
                    _ => unreachable!("leading character was A"),
                };
                let suffix = if header.invoice_total < 0 {
                    SUFFIX_CREDIT
                } else {
                    SUFFIX_INVOICE
                };
                let prefix = column_letters(invoice_count);
                let output_path =
                    scratch_dir.join(format!("{}_{}{}", prefix, stem, suffix));
                invoice_count += 1;

                let mut file = File::create(&output_path)?;
                write!(file, "{line}\r\n")?;

                current = Some(OpenInvoice {
                    file,
                    output_path,
                    prefix,
                    suffix,
                    b_lines: Vec::new(),
                    c_lines: Vec::new(),
                });
            }
            Some('B') => {
                let invoice = current.as_mut().ok_or(EdiError::RecordBeforeHeader {
                    file: file_name.clone(),
                    line: line_no,
                })?;
                let upc = format.b.upc_number.of(line).to_string();
                invoice.b_lines.push((line.to_string(), upc));
            }
            Some('C') => {
                let invoice = current.as_mut().ok_or(EdiError::RecordBeforeHeader {
                    file: file_name.clone(),
                    line: line_no,
                })?;
                invoice.c_lines.push(line.to_string());
            }
            other => {
                return Err(EdiError::MalformedRecord {
                    file: file_name.clone(),
                    line: line_no,
                    message: format!(
                        "unexpected record type {:?}",
                        other.map(String::from).unwrap_or_default()
                    ),
                });
            }
        }
    }

    if let Some(invoice) = current.take() {
        flush_invoice(
            invoice,
            filter,
            lookup,
            &mut descriptors,
            &mut lines_written,
            &mut lines_dropped,
        )?;
    }

    // Internal consistency: every line read must be accounted for.
    if lines_written + lines_dropped != lines_read {
        return Err(EdiError::SplitReconciliation {
            file: file_name,
            read: lines_read,
            written: lines_written,
            dropped: lines_dropped,
        });
    }
    if descriptors.is_empty() {
        return Err(EdiError::NoInvoicesSurvived { file: file_name });
    }

    debug!(
        file = %file_name,
        invoices = invoice_count,
        survived = descriptors.len(),
        lines_read,
        lines_written,
        "EDI split complete"
    );

    Ok(descriptors)
}

struct OpenInvoice {
    file: File,
    output_path: PathBuf,
    prefix: String,
    suffix: &'static str,
    /// Buffered line items with their raw UPC field.
    b_lines: Vec<(String, String)>,
    c_lines: Vec<String>,
}

fn flush_invoice(
    mut invoice: OpenInvoice,
    filter: &CategoryFilter,
    lookup: &dyn CategoryLookup,
    descriptors: &mut Vec<SplitDescriptor>,
    lines_written: &mut usize,
    lines_dropped: &mut usize,
) -> Result<()> {
    let total_b = invoice.b_lines.len();
    let surviving: Vec<&String> = invoice
        .b_lines
        .iter()
        .filter(|(_, upc)| filter.keeps(lookup.category_for(upc)))
        .map(|(line, _)| line)
        .collect();

    if surviving.is_empty() {
        // Nothing left to invoice: the header and charges go with it.
        drop(invoice.file);
        fs::remove_file(&invoice.output_path)?;
        *lines_dropped += 1 + total_b + invoice.c_lines.len();
        return Ok(());
    }

    *lines_dropped += total_b - surviving.len();
    for line in &surviving {
        write!(invoice.file, "{line}\r\n")?;
    }
    for line in &invoice.c_lines {
        write!(invoice.file, "{line}\r\n")?;
    }
    *lines_written += 1 + surviving.len() + invoice.c_lines.len();
    invoice.file.flush()?;

    descriptors.push(SplitDescriptor {
        output_path: invoice.output_path,
        filename_prefix: invoice.prefix,
        filename_suffix: invoice.suffix,
    });
    Ok(())
}

/// Excel-style column letters for a zero-based ordinal (A, B, ... Z, AA, ...).
fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).expect("ascii letters")
}
