//! Registry mapping operand types to column selectors.
//!
//! Lookup order for a node's operand type:
//! 1. a selector registered for exactly that type
//! 2. a previous ancestor resolution cached for that type
//! 3. the first registered ancestor, most specific first, which is then cached
//!
//! Registration is one-shot per type. Registering clears the resolution
//! cache, since a new registration may shadow a cached ancestor.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use common_error::{TesselError, TesselResult};
use log::debug;
use tessel_graph::{OpType, TileableData};

use super::{builtin, SelectorFn};

/// Column selectors keyed by operand type identity.
#[derive(Default)]
pub struct SelectorRegistry {
    registered: RwLock<HashMap<&'static OpType, SelectorFn>>,
    resolved: RwLock<HashMap<&'static OpType, SelectorFn>>,
    ancestor_walks: AtomicUsize,
}

impl fmt::Debug for SelectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered = self.registered.read().map(|m| m.len()).unwrap_or_default();
        let resolved = self.resolved.read().map(|m| m.len()).unwrap_or_default();
        f.debug_struct("SelectorRegistry")
            .field("registered", &registered)
            .field("resolved", &resolved)
            .finish()
    }
}

fn poisoned<T>(_: T) -> TesselError {
    TesselError::internal("selector registry lock poisoned")
}

impl SelectorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in dataframe selectors.
    pub fn with_builtins() -> Self {
        let registered = builtin::builtin_selectors()
            .into_iter()
            .collect();
        Self {
            registered: RwLock::new(registered),
            ..Self::default()
        }
    }

    /// Register `selector` for `op_type`.
    ///
    /// Fails with a `ConfigError` if `op_type` already has a selector; the
    /// existing one stays active.
    pub fn register<F>(&self, op_type: &'static OpType, selector: F) -> TesselResult<()>
    where
        F: Fn(&TileableData) -> BTreeSet<String> + Send + Sync + 'static,
    {
        self.register_fn(op_type, Arc::new(selector))
    }

    /// Same as [`SelectorRegistry::register`] for an already shared selector.
    pub fn register_fn(&self, op_type: &'static OpType, selector: SelectorFn) -> TesselResult<()> {
        let mut registered = self.registered.write().map_err(poisoned)?;
        if registered.contains_key(op_type) {
            return Err(TesselError::config(format!(
                "selector for {op_type} is already registered"
            )));
        }
        registered.insert(op_type, selector);
        self.resolved.write().map_err(poisoned)?.clear();
        debug!("Registered column selector for {op_type}");
        Ok(())
    }

    /// Whether a selector is registered for exactly `op_type`.
    pub fn is_registered(&self, op_type: &OpType) -> bool {
        self.registered
            .read()
            .map(|m| m.contains_key(op_type))
            .unwrap_or(false)
    }

    /// Selector applying to `op_type`, if any.
    pub fn resolve(&self, op_type: &'static OpType) -> TesselResult<Option<SelectorFn>> {
        let registered = self.registered.read().map_err(poisoned)?;
        if let Some(selector) = registered.get(op_type) {
            return Ok(Some(Arc::clone(selector)));
        }
        if let Some(selector) = self.resolved.read().map_err(poisoned)?.get(op_type) {
            return Ok(Some(Arc::clone(selector)));
        }

        self.ancestor_walks.fetch_add(1, Ordering::Relaxed);
        let found = op_type
            .ancestors()
            .find_map(|ancestor| registered.get(ancestor).map(|s| (ancestor, s)));
        match found {
            Some((ancestor, selector)) => {
                debug!("Column selector for {op_type} resolved to {ancestor}");
                self.resolved
                    .write()
                    .map_err(poisoned)?
                    .insert(op_type, Arc::clone(selector));
                Ok(Some(Arc::clone(selector)))
            }
            None => Ok(None),
        }
    }

    /// Columns `node`'s operand reads; empty when no selector applies.
    pub fn select(&self, node: &TileableData) -> TesselResult<BTreeSet<String>> {
        let op_type = node.op().op_type();
        match self.resolve(op_type)? {
            Some(selector) => Ok(selector(node)),
            None => {
                debug!("No column selector for {op_type}; column use of {} unknown", node.key());
                Ok(BTreeSet::new())
            }
        }
    }

    /// Number of times a lookup had to walk an ancestor chain.
    pub fn ancestor_walks(&self) -> usize {
        self.ancestor_walks.load(Ordering::Relaxed)
    }
}

/// The process-wide registry, pre-populated with the built-in selectors.
pub fn global_selector_registry() -> &'static SelectorRegistry {
    static REGISTRY: OnceLock<SelectorRegistry> = OnceLock::new();
    REGISTRY.get_or_init(SelectorRegistry::with_builtins)
}

/// Register a selector in the process-wide registry.
pub fn register_selector<F>(op_type: &'static OpType, selector: F) -> TesselResult<()>
where
    F: Fn(&TileableData) -> BTreeSet<String> + Send + Sync + 'static,
{
    global_selector_registry().register(op_type, selector)
}
