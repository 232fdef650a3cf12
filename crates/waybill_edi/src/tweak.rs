//! Post-conversion tweak stage.
//!
//! A tweaker is a single transform applied to an already-converted output
//! file. The business tweakers are external; this crate carries the contract,
//! a registry, and the default no-op.

use crate::convert::ConvertContext;
use crate::error::{EdiError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Post-conversion transform contract.
pub trait Tweaker: Send + Sync {
    fn name(&self) -> &'static str;

    /// Transform `input` into a file under `output_dir` and return the
    /// resulting path (which may be `input` itself when nothing changed).
    fn tweak(&self, input: &Path, output_dir: &Path, ctx: &ConvertContext) -> Result<PathBuf>;
}

/// Leaves the converted file untouched.
pub struct NoopTweaker;

impl Tweaker for NoopTweaker {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn tweak(&self, input: &Path, _output_dir: &Path, _ctx: &ConvertContext) -> Result<PathBuf> {
        Ok(input.to_path_buf())
    }
}

/// Name → tweaker registry, populated at startup like the converter registry.
pub struct TweakerRegistry {
    tweakers: HashMap<String, Arc<dyn Tweaker>>,
}

impl TweakerRegistry {
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            tweakers: HashMap::new(),
        };
        registry.register(Arc::new(NoopTweaker));
        registry
    }

    pub fn register(&mut self, tweaker: Arc<dyn Tweaker>) {
        self.tweakers.insert(tweaker.name().to_string(), tweaker);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Tweaker>> {
        self.tweakers
            .get(name)
            .cloned()
            .ok_or_else(|| EdiError::UnknownTweaker(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::STANDARD_FORMAT;
    use crate::EmptyLookup;

    #[test]
    fn noop_tweaker_returns_input_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("converted.csv");
        std::fs::write(&input, "a,b\n").unwrap();

        let lookup = EmptyLookup;
        let ctx = ConvertContext {
            format: &STANDARD_FORMAT,
            output_dir: dir.path(),
            lookup: &lookup,
            calc_upc_check_digit: false,
        };

        let out = NoopTweaker.tweak(&input, dir.path(), &ctx).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn registry_rejects_unknown_tweaker() {
        let registry = TweakerRegistry::with_builtins();
        assert!(registry.get("noop").is_ok());
        assert!(matches!(
            registry.get("reprice"),
            Err(EdiError::UnknownTweaker(_))
        ));
    }
}
