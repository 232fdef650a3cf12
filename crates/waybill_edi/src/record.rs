//! Fixed-width EDI record formats and byte-offset parsing.
//!
//! An EDI file is newline-terminated ASCII. Every non-blank line starts with
//! a record type character: A (invoice header), B (line item), C (charge or
//! adjustment). A line starting with ASCII SUB (0x1A) is a DOS EOF marker
//! and is tolerated at the end of a file.

use crate::error::{EdiError, Result};
use crate::helpers::qty_to_int;

/// DOS end-of-file marker byte.
const EOF_MARKER: char = '\u{1a}';

/// Byte range of one field within a fixed-width line.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpan {
    pub start: usize,
    pub end: usize,
}

impl FieldSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Extract and trim the field from a line. Short lines yield what is
    /// present; a field entirely past the end (or one that would cut a
    /// non-ASCII byte sequence) is empty.
    pub fn of<'a>(&self, line: &'a str) -> &'a str {
        let len = line.len();
        let start = self.start.min(len);
        let end = self.end.min(len);
        line.get(start..end).unwrap_or("").trim()
    }
}

/// Field layout of the invoice header (A) record.
#[derive(Debug, Clone, Copy)]
pub struct AFields {
    pub cust_vendor: FieldSpan,
    pub invoice_number: FieldSpan,
    pub invoice_date: FieldSpan,
    pub invoice_total: FieldSpan,
}

/// Field layout of the line-item (B) record.
#[derive(Debug, Clone, Copy)]
pub struct BFields {
    pub upc_number: FieldSpan,
    pub description: FieldSpan,
    pub vendor_item: FieldSpan,
    pub unit_cost: FieldSpan,
    pub combo_code: FieldSpan,
    pub unit_multiplier: FieldSpan,
    pub qty_of_units: FieldSpan,
    pub suggested_retail_price: FieldSpan,
    pub price_multi_pack: FieldSpan,
    pub parent_item_number: FieldSpan,
}

/// Field layout of the charge/adjustment (C) record.
#[derive(Debug, Clone, Copy)]
pub struct CFields {
    pub charge_type: FieldSpan,
    pub description: FieldSpan,
    pub amount: FieldSpan,
}

/// A named fixed-width record-format definition.
///
/// Folder configs select a format by name (`edi_format`); unknown names are
/// a configuration error, not a runtime failure.
#[derive(Debug, Clone, Copy)]
pub struct EdiFormat {
    pub name: &'static str,
    pub a: AFields,
    pub b: BFields,
    pub c: CFields,
}

/// The stock DAC invoice layout.
pub const STANDARD_FORMAT: EdiFormat = EdiFormat {
    name: "standard",
    a: AFields {
        cust_vendor: FieldSpan::new(1, 7),
        invoice_number: FieldSpan::new(7, 15),
        invoice_date: FieldSpan::new(15, 21),
        invoice_total: FieldSpan::new(21, 29),
    },
    b: BFields {
        upc_number: FieldSpan::new(1, 12),
        description: FieldSpan::new(12, 37),
        vendor_item: FieldSpan::new(37, 47),
        unit_cost: FieldSpan::new(47, 55),
        combo_code: FieldSpan::new(55, 57),
        unit_multiplier: FieldSpan::new(57, 61),
        qty_of_units: FieldSpan::new(61, 65),
        suggested_retail_price: FieldSpan::new(65, 73),
        price_multi_pack: FieldSpan::new(73, 76),
        parent_item_number: FieldSpan::new(76, 85),
    },
    c: CFields {
        charge_type: FieldSpan::new(1, 4),
        description: FieldSpan::new(4, 29),
        amount: FieldSpan::new(29, 37),
    },
};

impl EdiFormat {
    /// Look up a record-format definition by configured name.
    pub fn named(name: &str) -> Result<&'static EdiFormat> {
        match name {
            "standard" => Ok(&STANDARD_FORMAT),
            other => Err(EdiError::UnknownFormat(other.to_string())),
        }
    }
}

/// Parsed invoice header.
#[derive(Debug, Clone)]
pub struct ARecord {
    pub cust_vendor: String,
    pub invoice_number: String,
    /// MMDDYY as written in the file.
    pub invoice_date: String,
    /// Signed cents.
    pub invoice_total: i64,
}

/// Parsed line item. String fields keep the raw (trimmed) field text; the
/// UPC is normalized separately by the converters.
#[derive(Debug, Clone)]
pub struct BRecord {
    pub upc_number: String,
    pub description: String,
    pub vendor_item: String,
    pub unit_cost: String,
    pub combo_code: String,
    pub unit_multiplier: String,
    /// Signed unit count.
    pub qty_of_units: i64,
    pub suggested_retail_price: String,
    pub price_multi_pack: String,
    pub parent_item_number: String,
}

/// Parsed charge/adjustment.
#[derive(Debug, Clone)]
pub struct CRecord {
    pub charge_type: String,
    pub description: String,
    /// Signed cents.
    pub amount: i64,
}

/// One parsed EDI line.
#[derive(Debug, Clone)]
pub enum EdiRecord {
    Header(ARecord),
    LineItem(BRecord),
    Charge(CRecord),
}

/// Leading record-type character of a line, if any.
pub fn record_type_of(line: &str) -> Option<char> {
    line.chars().next()
}

/// Whether the line is blank (only whitespace).
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Whether the line is a DOS EOF marker.
pub fn is_eof_marker(line: &str) -> bool {
    line.trim_end().starts_with(EOF_MARKER)
}

impl EdiFormat {
    /// Parse one non-blank line. `file` and `line_no` feed error context.
    pub fn parse_line(&self, line: &str, file: &str, line_no: usize) -> Result<EdiRecord> {
        let line = line.trim_end_matches(['\r', '\n']);
        match record_type_of(line) {
            Some('A') => Ok(EdiRecord::Header(self.parse_a(line, file, line_no)?)),
            Some('B') => Ok(EdiRecord::LineItem(self.parse_b(line, file, line_no)?)),
            Some('C') => Ok(EdiRecord::Charge(self.parse_c(line, file, line_no)?)),
            other => Err(EdiError::MalformedRecord {
                file: file.to_string(),
                line: line_no,
                message: format!(
                    "unexpected record type {:?}",
                    other.map(String::from).unwrap_or_default()
                ),
            }),
        }
    }

    fn parse_a(&self, line: &str, file: &str, line_no: usize) -> Result<ARecord> {
        let total_field = self.a.invoice_total.of(line);
        let invoice_total = qty_to_int(total_field).ok_or_else(|| EdiError::MalformedRecord {
            file: file.to_string(),
            line: line_no,
            message: format!("unparsable invoice total {total_field:?}"),
        })?;

        Ok(ARecord {
            cust_vendor: self.a.cust_vendor.of(line).to_string(),
            invoice_number: self.a.invoice_number.of(line).to_string(),
            invoice_date: self.a.invoice_date.of(line).to_string(),
            invoice_total,
        })
    }

    fn parse_b(&self, line: &str, file: &str, line_no: usize) -> Result<BRecord> {
        let qty_field = self.b.qty_of_units.of(line);
        let qty_of_units = qty_to_int(qty_field).ok_or_else(|| EdiError::MalformedRecord {
            file: file.to_string(),
            line: line_no,
            message: format!("unparsable quantity {qty_field:?}"),
        })?;

        Ok(BRecord {
            upc_number: self.b.upc_number.of(line).to_string(),
            description: self.b.description.of(line).to_string(),
            vendor_item: self.b.vendor_item.of(line).to_string(),
            unit_cost: self.b.unit_cost.of(line).to_string(),
            combo_code: self.b.combo_code.of(line).to_string(),
            unit_multiplier: self.b.unit_multiplier.of(line).to_string(),
            qty_of_units,
            suggested_retail_price: self.b.suggested_retail_price.of(line).to_string(),
            price_multi_pack: self.b.price_multi_pack.of(line).to_string(),
            parent_item_number: self.b.parent_item_number.of(line).to_string(),
        })
    }

    fn parse_c(&self, line: &str, file: &str, line_no: usize) -> Result<CRecord> {
        let amount_field = self.c.amount.of(line);
        let amount = qty_to_int(amount_field).ok_or_else(|| EdiError::MalformedRecord {
            file: file.to_string(),
            line: line_no,
            message: format!("unparsable charge amount {amount_field:?}"),
        })?;

        Ok(CRecord {
            charge_type: self.c.charge_type.of(line).to_string(),
            description: self.c.description.of(line).to_string(),
            amount,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_lines::*;
    use super::*;

    #[test]
    fn parse_a_record_fields() {
        let line = a_line("123456", "INV00042", "040126", "00012345");
        let rec = STANDARD_FORMAT.parse_line(&line, "t.edi", 1).unwrap();
        match rec {
            EdiRecord::Header(a) => {
                assert_eq!(a.cust_vendor, "123456");
                assert_eq!(a.invoice_number, "INV00042");
                assert_eq!(a.invoice_date, "040126");
                assert_eq!(a.invoice_total, 12345);
            }
            other => panic!("expected header, got {other:?}"),
        }
    }

    #[test]
    fn parse_b_record_signed_quantity() {
        let line = b_line("01234567890", "WIDGET", "-010");
        let rec = STANDARD_FORMAT.parse_line(&line, "t.edi", 2).unwrap();
        match rec {
            EdiRecord::LineItem(b) => {
                assert_eq!(b.upc_number, "01234567890");
                assert_eq!(b.description, "WIDGET");
                assert_eq!(b.qty_of_units, -10);
            }
            other => panic!("expected line item, got {other:?}"),
        }
    }

    #[test]
    fn parse_c_record_negative_amount() {
        let line = c_line("FRT", "FREIGHT", "-0000150");
        let rec = STANDARD_FORMAT.parse_line(&line, "t.edi", 3).unwrap();
        match rec {
            EdiRecord::Charge(c) => {
                assert_eq!(c.charge_type, "FRT");
                assert_eq!(c.description, "FREIGHT");
                assert_eq!(c.amount, -150);
            }
            other => panic!("expected charge, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_unknown_record_type() {
        let err = STANDARD_FORMAT.parse_line("X garbage", "t.edi", 9).unwrap_err();
        assert!(matches!(err, EdiError::MalformedRecord { line: 9, .. }));
    }

    #[test]
    fn short_lines_yield_empty_trailing_fields() {
        // Header cut off before the total: total field is blank, decodes to 0.
        let rec = STANDARD_FORMAT.parse_line("A123456", "t.edi", 1).unwrap();
        match rec {
            EdiRecord::Header(a) => {
                assert_eq!(a.cust_vendor, "123456");
                assert_eq!(a.invoice_number, "");
                assert_eq!(a.invoice_total, 0);
            }
            other => panic!("expected header, got {other:?}"),
        }
    }

    #[test]
    fn unknown_format_name_is_config_error() {
        assert!(matches!(
            EdiFormat::named("dacplus"),
            Err(EdiError::UnknownFormat(_))
        ));
        assert!(EdiFormat::named("standard").is_ok());
    }

    #[test]
    fn eof_marker_detection() {
        assert!(is_eof_marker("\u{1a}"));
        assert!(!is_eof_marker("A123"));
        assert!(is_blank("   \r\n"));
    }
}
