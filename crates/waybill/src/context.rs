//! Per-run shared context.

use crate::lookup::UpcLookup;
use crate::settings::Settings;
use std::sync::Arc;
use waybill_edi::{ConverterRegistry, TweakerRegistry};

/// Everything a pipeline stage may read during a run.
///
/// Built once at run start and never mutated; the only writable state is
/// the ledger, which the coordinator touches behind the per-folder barrier.
pub struct RunContext {
    pub settings: Settings,
    pub lookup: Arc<UpcLookup>,
    pub converters: Arc<ConverterRegistry>,
    pub tweakers: Arc<TweakerRegistry>,
}

impl RunContext {
    /// Assemble a context from settings, loading the lookup table when one
    /// is configured.
    pub fn build(settings: Settings) -> anyhow::Result<Self> {
        let lookup = match &settings.lookup_table {
            Some(path) => UpcLookup::load(path)?,
            None => UpcLookup::empty(),
        };
        Ok(Self {
            settings,
            lookup: Arc::new(lookup),
            converters: Arc::new(ConverterRegistry::with_builtins()),
            tweakers: Arc::new(TweakerRegistry::with_builtins()),
        })
    }
}
