//! Caller-facing facade over one target executable.
//!
//! The engine modules answer one question each and never fall back on their
//! own. `Target` is where the policies live: which calling-convention
//! strategy wins, what happens when the thread-id field is missing, and how
//! repeated return-offset queries are memoized.

use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::analysis::abi::{detect_from_helper, detect_from_producer, CallingConvention};
use crate::analysis::goid::locate_field;
use crate::analysis::returns::{symbol_return_offsets, ReturnOffsetSet};
use crate::config::AnalysisConfig;
use crate::core::BinaryImage;
use crate::dwarf::DebugTree;
use crate::error::{ProbeError, Result};
use crate::formats::load;
use crate::io::error::IoError;
use crate::io::read_target;
use crate::log_error;

type CacheKey = (PathBuf, String);
type CacheSlot = Arc<OnceCell<ReturnOffsetSet>>;

/// Shared memo of return offsets, keyed by executable path and symbol name.
///
/// Cloning the handle shares the underlying map. Concurrent queries for the
/// same key wait for a single computation; a failed computation leaves
/// nothing behind, so a later query retries.
#[derive(Debug, Clone, Default)]
pub struct ReturnOffsetCache {
    slots: Arc<Mutex<HashMap<CacheKey, CacheSlot>>>,
}

impl ReturnOffsetCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, exe: &Path, symbol: &str) -> CacheSlot {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots
            .entry((exe.to_path_buf(), symbol.to_string()))
            .or_default()
            .clone()
    }

    /// Cached value for `symbol` in `exe`, or the result of `compute`.
    pub fn get_or_compute<F>(&self, exe: &Path, symbol: &str, compute: F) -> Result<ReturnOffsetSet>
    where
        F: FnOnce() -> Result<ReturnOffsetSet>,
    {
        let slot = self.slot(exe, symbol);
        if let Some(hit) = slot.get() {
            debug!(symbol, "Return offsets cache hit");
            return Ok(hit.clone());
        }
        let result = slot.get_or_try_init(compute).cloned();
        if result.is_err() {
            self.discard_empty(exe, symbol, slot);
        }
        result
    }

    // Drop a failed key's slot unless another caller still holds it.
    fn discard_empty(&self, exe: &Path, symbol: &str, slot: CacheSlot) {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        let key = (exe.to_path_buf(), symbol.to_string());
        let unused = slots
            .get(&key)
            .is_some_and(|held| Arc::ptr_eq(held, &slot) && held.get().is_none());
        // One reference in the map, one here.
        if unused && Arc::strong_count(&slot) == 2 {
            slots.remove(&key);
        }
    }

    pub fn get(&self, exe: &Path, symbol: &str) -> Option<ReturnOffsetSet> {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots
            .get(&(exe.to_path_buf(), symbol.to_string()))
            .and_then(|slot| slot.get().cloned())
    }

    /// Number of keys holding a computed value.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.values().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

/// Which strategy produced a calling-convention answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConventionSource {
    Producer,
    Helper,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConventionDecision {
    pub convention: CallingConvention,
    pub source: ConventionSource,
}

/// The values a probe template needs about one executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFacts {
    pub exe_path: String,
    pub thread_id_offset: u64,
    pub register_abi: bool,
}

impl TargetFacts {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// One loaded executable plus the policies applied on top of the engine.
pub struct Target {
    exe_path: PathBuf,
    image: BinaryImage,
    config: AnalysisConfig,
    // Parse outcome; the error reason is kept so every query reports it.
    debug_tree: OnceCell<std::result::Result<DebugTree, String>>,
    cache: ReturnOffsetCache,
}

impl Target {
    /// Read, map and load the executable at `path`.
    pub fn open<P: AsRef<Path>>(path: P, config: AnalysisConfig) -> Result<Self> {
        let exe_path = std::fs::canonicalize(path.as_ref())
            .map_err(|e| log_error!(ProbeError::Io(IoError::from(e)), "canonicalize target path"))?;
        let bytes = read_target(&exe_path, &config.io)?;
        let image = load(bytes).map_err(|e| log_error!(e, "load target"))?;
        info!(
            path = %exe_path.display(),
            arch = ?image.architecture(),
            symbols = image.symbols().len(),
            "Opened target"
        );
        Ok(Self::from_image(exe_path, image, config))
    }

    /// Wrap an already loaded image; `exe_path` is used as given.
    pub fn from_image(exe_path: impl Into<PathBuf>, image: BinaryImage, config: AnalysisConfig) -> Self {
        Self {
            exe_path: exe_path.into(),
            image,
            config,
            debug_tree: OnceCell::new(),
            cache: ReturnOffsetCache::new(),
        }
    }

    /// Use an already parsed debug-info tree instead of parsing the image.
    pub fn with_debug_tree(mut self, tree: DebugTree) -> Self {
        self.debug_tree = OnceCell::with_value(Ok(tree));
        self
    }

    /// Use `cache` instead of the private one created at construction.
    pub fn with_cache(mut self, cache: ReturnOffsetCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn exe_path(&self) -> &Path {
        &self.exe_path
    }

    pub fn image(&self) -> &BinaryImage {
        &self.image
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn cache(&self) -> &ReturnOffsetCache {
        &self.cache
    }

    /// The debug-info tree, parsed on first use.
    pub fn debug_tree(&self) -> Result<&DebugTree> {
        let parsed = self.debug_tree.get_or_init(|| {
            DebugTree::parse(&self.image).map_err(|e| match e {
                ProbeError::DebugInfoUnavailable(reason) => reason,
                other => other.to_string(),
            })
        });
        parsed
            .as_ref()
            .map_err(|reason| ProbeError::DebugInfoUnavailable(reason.clone()))
    }

    /// Offset of the scheduler's thread-identifier field.
    pub fn thread_id_offset(&self) -> Result<u64> {
        let runtime = &self.config.runtime;
        let located = self
            .debug_tree()
            .and_then(|tree| locate_field(tree, &runtime.scheduler_struct, &runtime.thread_id_field));
        match (located, runtime.fallback_thread_id_offset) {
            (Ok(field), _) => Ok(field.offset),
            (Err(e), Some(fallback)) => {
                warn!(
                    error = %e,
                    structure = %runtime.scheduler_struct,
                    field = %runtime.thread_id_field,
                    fallback,
                    "Thread-id field not resolved, using configured offset"
                );
                Ok(fallback)
            }
            (Err(e), None) => Err(log_error!(e, "resolve thread-id field")),
        }
    }

    /// Producer string first, then the helper heuristic, then stack-based.
    pub fn calling_convention(&self) -> ConventionDecision {
        let abi = &self.config.abi;
        let producer_err = match self
            .debug_tree()
            .and_then(|tree| detect_from_producer(tree, &abi.register_abi_suffix))
        {
            Ok(convention) => {
                return ConventionDecision {
                    convention,
                    source: ConventionSource::Producer,
                }
            }
            Err(e) => e,
        };
        debug!(error = %producer_err, "Producer strategy failed, trying helper");

        match detect_from_helper(&self.image, &abi.helper_symbol) {
            Ok(convention) => ConventionDecision {
                convention,
                source: ConventionSource::Helper,
            },
            Err(helper_err) => {
                warn!(
                    producer_error = %producer_err,
                    helper_error = %helper_err,
                    "Calling convention undetermined, assuming stack-based"
                );
                ConventionDecision {
                    convention: CallingConvention::StackBased,
                    source: ConventionSource::Default,
                }
            }
        }
    }

    /// Return offsets of `symbol`, memoized in this target's cache.
    pub fn symbol_returns(&self, symbol: &str) -> Result<ReturnOffsetSet> {
        self.cache
            .get_or_compute(&self.exe_path, symbol, || symbol_return_offsets(&self.image, symbol))
    }

    /// [`Target::symbol_returns`] for many symbols on the rayon pool.
    pub fn symbol_returns_many<S: AsRef<str> + Sync>(
        &self,
        symbols: &[S],
    ) -> Vec<(String, Result<ReturnOffsetSet>)> {
        symbols
            .par_iter()
            .map(|s| {
                let name = s.as_ref();
                (name.to_string(), self.symbol_returns(name))
            })
            .collect()
    }

    /// Everything a probe template consumes, resolved with the policies above.
    pub fn facts(&self) -> Result<TargetFacts> {
        let thread_id_offset = self.thread_id_offset()?;
        let decision = self.calling_convention();
        Ok(TargetFacts {
            exe_path: self.exe_path.display().to_string(),
            thread_id_offset,
            register_abi: decision.convention.is_register_based(),
        })
    }
}
