//! Converter contract and shared conversion driver.
//!
//! A converter supplies init/finalize plus one hook per record type; the
//! driver reads the file once, dispatches each parsed record, and keeps the
//! most recent invoice header visible to the line-item and charge hooks.
//! Formats are resolved through a static registry populated at startup.

use crate::error::{EdiError, Result};
use crate::helpers::{convert_to_price, price_from_cents, process_upc};
use crate::record::{is_blank, is_eof_marker, ARecord, BRecord, CRecord, EdiFormat, EdiRecord};
use crate::CategoryLookup;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read-only inputs shared by conversion and tweaking.
pub struct ConvertContext<'a> {
    pub format: &'a EdiFormat,
    /// Directory converted output is written into.
    pub output_dir: &'a Path,
    pub lookup: &'a dyn CategoryLookup,
    pub calc_upc_check_digit: bool,
}

/// One output format. Implementations supply only the record hooks; the
/// pipeline state machine lives in [`run_conversion`].
pub trait Converter: Send {
    fn initialize_output(&mut self, input: &Path, ctx: &ConvertContext) -> Result<()>;
    fn process_record_a(&mut self, record: &ARecord, ctx: &ConvertContext) -> Result<()>;
    fn process_record_b(
        &mut self,
        record: &BRecord,
        current: Option<&ARecord>,
        ctx: &ConvertContext,
    ) -> Result<()>;
    fn process_record_c(
        &mut self,
        record: &CRecord,
        current: Option<&ARecord>,
        ctx: &ConvertContext,
    ) -> Result<()>;
    /// Close the output sink and return the output path.
    fn finalize_output(&mut self, ctx: &ConvertContext) -> Result<PathBuf>;
}

/// Drive one converter over one EDI file.
pub fn run_conversion(
    converter: &mut dyn Converter,
    input: &Path,
    ctx: &ConvertContext,
) -> Result<PathBuf> {
    let file_name = input.display().to_string();
    let content = fs::read_to_string(input).map_err(|e| {
        EdiError::Conversion(format!("cannot open input file {file_name}: {e}"))
    })?;

    converter.initialize_output(input, ctx)?;

    let mut current_a: Option<ARecord> = None;
    for (idx, raw_line) in content.lines().enumerate() {
        if is_blank(raw_line) || is_eof_marker(raw_line) {
            continue;
        }
        match ctx.format.parse_line(raw_line, &file_name, idx + 1)? {
            EdiRecord::Header(a) => {
                converter.process_record_a(&a, ctx)?;
                current_a = Some(a);
            }
            EdiRecord::LineItem(b) => {
                converter.process_record_b(&b, current_a.as_ref(), ctx)?;
            }
            EdiRecord::Charge(c) => {
                converter.process_record_c(&c, current_a.as_ref(), ctx)?;
            }
        }
    }

    let output = converter.finalize_output(ctx)?;
    debug!(input = %file_name, output = %output.display(), "Conversion finished");
    Ok(output)
}

/// Factory for one registered converter.
pub type ConverterFactory = fn() -> Box<dyn Converter>;

/// Static format-name → converter registry.
///
/// Unknown names fail with a typed configuration error instead of a runtime
/// lookup failure. The business converters excluded from this crate register
/// here at startup.
pub struct ConverterRegistry {
    factories: HashMap<String, ConverterFactory>,
}

impl ConverterRegistry {
    /// Registry with the built-in formats (`csv`, `passthrough`).
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("csv", || Box::new(CsvConverter::default()));
        registry.register("passthrough", || Box::new(PassthroughConverter::default()));
        registry
    }

    pub fn register(&mut self, name: &str, factory: ConverterFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Converter>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| EdiError::UnknownConverter(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

// ============================================================================
// Built-in converters
// ============================================================================

/// Flat CSV rendition of the parsed record stream.
#[derive(Default)]
pub struct CsvConverter {
    writer: Option<csv::Writer<fs::File>>,
    output_path: Option<PathBuf>,
}

impl CsvConverter {
    fn writer(&mut self) -> Result<&mut csv::Writer<fs::File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| EdiError::Conversion("CSV output not initialized".to_string()))
    }
}

impl Converter for CsvConverter {
    fn initialize_output(&mut self, input: &Path, ctx: &ConvertContext) -> Result<()> {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let path = ctx.output_dir.join(format!("{stem}.csv"));
        fs::create_dir_all(ctx.output_dir)?;

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record([
            "record_type",
            "invoice_number",
            "invoice_date",
            "cust_vendor",
            "upc",
            "description",
            "vendor_item",
            "unit_cost",
            "qty",
            "suggested_retail",
            "charge_type",
            "amount",
        ])?;

        self.writer = Some(writer);
        self.output_path = Some(path);
        Ok(())
    }

    fn process_record_a(&mut self, record: &ARecord, _ctx: &ConvertContext) -> Result<()> {
        let total = price_from_cents(record.invoice_total);
        self.writer()?.write_record([
            "A",
            record.invoice_number.as_str(),
            record.invoice_date.as_str(),
            record.cust_vendor.as_str(),
            "",
            "",
            "",
            "",
            "",
            "",
            "",
            total.as_str(),
        ])?;
        Ok(())
    }

    fn process_record_b(
        &mut self,
        record: &BRecord,
        current: Option<&ARecord>,
        ctx: &ConvertContext,
    ) -> Result<()> {
        let invoice = current.map(|a| a.invoice_number.as_str()).unwrap_or("");
        let upc = process_upc(&record.upc_number, ctx.calc_upc_check_digit);
        let unit_cost = convert_to_price(&record.unit_cost).ok_or_else(|| {
            EdiError::Conversion(format!("unparsable unit cost {:?}", record.unit_cost))
        })?;
        let retail = convert_to_price(&record.suggested_retail_price).ok_or_else(|| {
            EdiError::Conversion(format!(
                "unparsable suggested retail {:?}",
                record.suggested_retail_price
            ))
        })?;
        let qty = record.qty_of_units.to_string();

        self.writer()?.write_record([
            "B",
            invoice,
            "",
            "",
            upc.as_str(),
            record.description.as_str(),
            record.vendor_item.as_str(),
            unit_cost.as_str(),
            qty.as_str(),
            retail.as_str(),
            "",
            "",
        ])?;
        Ok(())
    }

    fn process_record_c(
        &mut self,
        record: &CRecord,
        current: Option<&ARecord>,
        _ctx: &ConvertContext,
    ) -> Result<()> {
        let invoice = current.map(|a| a.invoice_number.as_str()).unwrap_or("");
        let amount = price_from_cents(record.amount);
        self.writer()?.write_record([
            "C",
            invoice,
            "",
            "",
            "",
            record.description.as_str(),
            "",
            "",
            "",
            "",
            record.charge_type.as_str(),
            amount.as_str(),
        ])?;
        Ok(())
    }

    fn finalize_output(&mut self, _ctx: &ConvertContext) -> Result<PathBuf> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| EdiError::Conversion(e.to_string()))?;
        }
        self.output_path
            .take()
            .ok_or_else(|| EdiError::Conversion("CSV output was never initialized".to_string()))
    }
}

/// Delivers the EDI file as-is. Used by folders that dispatch without
/// reformatting.
#[derive(Default)]
pub struct PassthroughConverter {
    input: Option<PathBuf>,
}

impl Converter for PassthroughConverter {
    fn initialize_output(&mut self, input: &Path, _ctx: &ConvertContext) -> Result<()> {
        self.input = Some(input.to_path_buf());
        Ok(())
    }

    fn process_record_a(&mut self, _record: &ARecord, _ctx: &ConvertContext) -> Result<()> {
        Ok(())
    }

    fn process_record_b(
        &mut self,
        _record: &BRecord,
        _current: Option<&ARecord>,
        _ctx: &ConvertContext,
    ) -> Result<()> {
        Ok(())
    }

    fn process_record_c(
        &mut self,
        _record: &CRecord,
        _current: Option<&ARecord>,
        _ctx: &ConvertContext,
    ) -> Result<()> {
        Ok(())
    }

    fn finalize_output(&mut self, ctx: &ConvertContext) -> Result<PathBuf> {
        let input = self
            .input
            .take()
            .ok_or_else(|| EdiError::Conversion("passthrough was never initialized".to_string()))?;
        let name = input
            .file_name()
            .ok_or_else(|| EdiError::Conversion(format!("no file name in {}", input.display())))?;
        let output = ctx.output_dir.join(name);
        if output != input {
            fs::create_dir_all(ctx.output_dir)?;
            fs::copy(&input, &output)?;
        }
        Ok(output)
    }
}
