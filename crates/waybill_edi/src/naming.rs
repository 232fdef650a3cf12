//! Deterministic output-file naming.
//!
//! A folder can rename delivered files through a template (supporting a
//! `%datetime%` token), carry the splitter's letter prefix and
//! invoice/credit suffix, and optionally prepend the delivery date.

use chrono::{DateTime, Utc};

/// Token replaced with the delivery timestamp (YYYYMMDDHHMMSS).
pub const DATETIME_TOKEN: &str = "%datetime%";

/// Naming inputs taken from the folder config and the splitter.
#[derive(Debug, Clone, Default)]
pub struct NamingParams<'a> {
    /// Apply the rename template instead of keeping the source name.
    pub rename: bool,
    pub template: &'a str,
    /// Prepend the delivery date (YYYYMMDD_).
    pub prepend_date: bool,
    /// Splitter letter prefix ("" for unsplit files).
    pub prefix: &'a str,
    /// Splitter suffix (".inv"/".cr", "" for unsplit files).
    pub suffix: &'a str,
}

/// Compute the delivered file name for `original_name`.
pub fn output_name(original_name: &str, params: &NamingParams, now: DateTime<Utc>) -> String {
    let mut name = if params.rename && !params.template.is_empty() {
        let expanded = params
            .template
            .replace(DATETIME_TOKEN, &now.format("%Y%m%d%H%M%S").to_string());
        let mut renamed = String::new();
        if !params.prefix.is_empty() {
            renamed.push_str(params.prefix);
            renamed.push('_');
        }
        renamed.push_str(&expanded);
        renamed.push_str(params.suffix);
        renamed
    } else {
        // Split scratch files already carry their prefix and suffix.
        original_name.to_string()
    };

    if params.prepend_date {
        name = format!("{}_{}", now.format("%Y%m%d"), name);
    }

    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 13, 5, 9).unwrap()
    }

    #[test]
    fn default_params_keep_original_name() {
        let name = output_name("A_batch.inv", &NamingParams::default(), fixed_now());
        assert_eq!(name, "A_batch.inv");
    }

    #[test]
    fn template_expands_datetime_token() {
        let params = NamingParams {
            rename: true,
            template: "invoice_%datetime%.txt",
            ..Default::default()
        };
        let name = output_name("batch.edi", &params, fixed_now());
        assert_eq!(name, "invoice_20260401130509.txt");
    }

    #[test]
    fn renamed_split_files_keep_prefix_and_suffix() {
        let params = NamingParams {
            rename: true,
            template: "store42",
            prefix: "B",
            suffix: ".cr",
            ..Default::default()
        };
        assert_eq!(output_name("B_batch.cr", &params, fixed_now()), "B_store42.cr");
    }

    #[test]
    fn prepend_date_applies_after_rename() {
        let params = NamingParams {
            prepend_date: true,
            ..Default::default()
        };
        assert_eq!(
            output_name("batch.edi", &params, fixed_now()),
            "20260401_batch.edi"
        );

        let params = NamingParams {
            rename: true,
            template: "out_%datetime%.csv",
            prepend_date: true,
            ..Default::default()
        };
        assert_eq!(
            output_name("batch.edi", &params, fixed_now()),
            "20260401_out_20260401130509.csv"
        );
    }
}
