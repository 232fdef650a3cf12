//! UPC lookup table.
//!
//! Stand-in for the external item service: a JSON export mapping UPC to
//! category (and vendor item). Loaded once per run and immutable thereafter.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;
use waybill_edi::CategoryLookup;

/// One item row from the export.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemEntry {
    pub category: String,
    #[serde(default)]
    pub vendor_item: String,
}

/// Immutable UPC → item table shared by splitting and conversion.
#[derive(Debug, Default)]
pub struct UpcLookup {
    items: HashMap<String, ItemEntry>,
}

impl UpcLookup {
    /// Empty table: every UPC is unknown.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the JSON export: `{ "<upc>": { "category": "...", "vendor_item": "..." } }`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lookup table {}", path.display()))?;
        let items: HashMap<String, ItemEntry> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse lookup table {}", path.display()))?;
        info!(path = %path.display(), items = items.len(), "UPC lookup table loaded");
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn vendor_item_for(&self, upc: &str) -> Option<&str> {
        self.items.get(upc).map(|e| e.vendor_item.as_str())
    }
}

impl CategoryLookup for UpcLookup {
    fn category_for(&self, upc: &str) -> Option<&str> {
        self.items.get(upc).map(|e| e.category.as_str())
    }
}
