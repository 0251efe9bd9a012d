//! Shared execution state: the index, the subtree cache, and the tuning
//! constants. One context is shared by every tree of a process.

use crate::cache::SubtreeCache;
use crate::cost_factors::CostFactors;
use hexic_index::Index;
use std::sync::Arc;

/// Process-wide execution context.
pub struct ExecutionContext {
    index: Arc<Index>,
    cache: SubtreeCache,
    cost_factors: CostFactors,
}

impl ExecutionContext {
    /// Context with a default-capacity cache and default cost factors.
    pub fn new(index: Arc<Index>) -> Self {
        Self {
            index,
            cache: SubtreeCache::new(hexic_core::constants::NOF_SUBTREES_TO_CACHE),
            cost_factors: CostFactors::new(),
        }
    }

    /// Override the cost factors (loaded at startup).
    pub fn with_cost_factors(mut self, cost_factors: CostFactors) -> Self {
        self.cost_factors = cost_factors;
        self
    }

    /// The shared index.
    pub fn index(&self) -> &Arc<Index> {
        &self.index
    }

    /// The subtree result cache.
    pub fn cache(&self) -> &SubtreeCache {
        &self.cache
    }

    /// A named cost factor (see [`CostFactors::get`]).
    pub fn cost_factor(&self, name: &str) -> f64 {
        self.cost_factors.get(name)
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("index", &self.index)
            .field("cached_subtrees", &self.cache.len())
            .finish()
    }
}
