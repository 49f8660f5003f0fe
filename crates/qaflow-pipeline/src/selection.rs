//! Selection state and the dependency-inference engine.
//!
//! A [`SelectionState`] is an insertion-ordered map from step id to
//! [`Origin`]. Every selected step carries an explicit origin, and the
//! insertion order is the order a pipeline run executes in.
//!
//! [`infer`] applies one user toggle and then adjusts the two pivot steps
//! ([`TEST_PLANNING`], [`ENVIRONMENT_SETUP`]):
//!
//! 1. `requirement-analysis` + `test-planning` selected → add `environment-setup`.
//! 2. otherwise `test-scenario-generation` + `environment-setup` selected → add
//!    `test-planning`.
//! 3. otherwise two non-pivot steps with adjacent ordinals → add both pivots.
//!
//! When none of the three conditions hold, pivots the engine added earlier
//! (origin `auto`) are removed again. Manually selected steps are never added
//! or removed by inference.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use qaflow_types::{Origin, Result, StepId};

use crate::catalog::{
    is_pivot, Catalog, ENVIRONMENT_SETUP, PIVOTS, REQUIREMENT_ANALYSIS, TEST_PLANNING,
    TEST_SCENARIO_GENERATION,
};

// ---------------------------------------------------------------------------
// SelectionState
// ---------------------------------------------------------------------------

/// The chosen steps in selection order, each tagged with its origin.
///
/// Equality compares membership and origins; use [`order`](Self::order) when
/// the execution order matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionState {
    entries: IndexMap<StepId, Origin>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state directly from `(id, origin)` pairs, keeping the first
    /// occurrence of a repeated id. Does not run inference.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Origin)>,
        S: Into<StepId>,
    {
        let mut state = Self::new();
        for (id, origin) in entries {
            state.entries.entry(id.into()).or_insert(origin);
        }
        state
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn origin(&self, id: &str) -> Option<Origin> {
        self.entries.get(id).copied()
    }

    pub fn is_manual(&self, id: &str) -> bool {
        self.origin(id) == Some(Origin::Manual)
    }

    pub fn is_auto(&self, id: &str) -> bool {
        self.origin(id) == Some(Origin::Auto)
    }

    /// Selected ids in insertion order.
    pub fn order(&self) -> Vec<StepId> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Origin)> {
        self.entries.iter().map(|(id, origin)| (id.as_str(), *origin))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply a toggle through the inference engine. See [`infer`].
    pub fn toggle(&self, id: &str, automation_enabled: bool, catalog: &Catalog) -> Result<Self> {
        infer(id, self, automation_enabled, catalog)
    }

    fn insert(&mut self, id: &str, origin: Origin) {
        self.entries.insert(id.to_string(), origin);
    }

    /// Remove keeping the order of the remaining entries.
    fn remove(&mut self, id: &str) -> Option<Origin> {
        self.entries.shift_remove(id)
    }
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

/// Which structural conditions hold for a selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceSignals {
    /// Two non-pivot steps sit next to each other in the catalog.
    pub has_consecutive: bool,
    /// `requirement-analysis` and `test-planning` are both selected.
    pub req_and_plan: bool,
    /// `test-scenario-generation` and `environment-setup` are both selected.
    pub env_and_scenario: bool,
}

impl InferenceSignals {
    pub fn any(&self) -> bool {
        self.has_consecutive || self.req_and_plan || self.env_and_scenario
    }
}

/// Compute the signals for `state`. Fails if a selected id is not in the catalog.
pub fn signals(state: &SelectionState, catalog: &Catalog) -> Result<InferenceSignals> {
    let others = state
        .entries
        .keys()
        .filter(|id| !is_pivot(id))
        .map(|id| catalog.ordinal(id).map(|ordinal| (id.as_str(), ordinal)))
        .collect::<Result<Vec<_>>>()?;

    let has_consecutive = find_consecutive(&others).is_some();
    let has_other = |target: &str| others.iter().any(|(id, _)| *id == target);

    Ok(InferenceSignals {
        has_consecutive,
        req_and_plan: has_other(REQUIREMENT_ANALYSIS) && state.contains(TEST_PLANNING),
        env_and_scenario: has_other(TEST_SCENARIO_GENERATION) && state.contains(ENVIRONMENT_SETUP),
    })
}

/// First unordered pair whose ordinals differ by exactly one.
fn find_consecutive<'a>(others: &[(&'a str, usize)]) -> Option<(&'a str, &'a str)> {
    for (i, (a, ord_a)) in others.iter().enumerate() {
        for (b, ord_b) in &others[i + 1..] {
            if ord_a.abs_diff(*ord_b) == 1 {
                tracing::debug!(first = %a, second = %b, "Found consecutive steps");
                return Some((*a, *b));
            }
        }
    }
    None
}

/// Toggle `toggled` in `state` and, when automation is enabled, add or remove
/// `auto` pivot steps according to the structural rules.
///
/// Toggling an absent id appends it as `manual`; toggling a present id removes
/// it whatever its origin. With automation disabled only `toggled` changes.
/// Unknown ids (toggled or already selected) are a configuration error.
pub fn infer(
    toggled: &str,
    state: &SelectionState,
    automation_enabled: bool,
    catalog: &Catalog,
) -> Result<SelectionState> {
    catalog.require(toggled)?;

    let mut next = state.clone();
    if next.remove(toggled).is_some() {
        tracing::debug!(step = %toggled, "Deselected step");
    } else {
        next.insert(toggled, Origin::Manual);
        tracing::debug!(step = %toggled, "Selected step");
    }

    if !automation_enabled {
        return Ok(next);
    }

    let signals = signals(&next, catalog)?;

    if signals.req_and_plan && !next.contains(ENVIRONMENT_SETUP) {
        add_auto(&mut next, ENVIRONMENT_SETUP, "requirement analysis with test planning");
    } else if signals.env_and_scenario && !next.contains(TEST_PLANNING) {
        add_auto(&mut next, TEST_PLANNING, "scenario generation with environment setup");
    } else if signals.has_consecutive {
        for pivot in PIVOTS {
            if !next.contains(pivot) {
                add_auto(&mut next, pivot, "consecutive steps");
            }
        }
    }

    if !signals.any() {
        for pivot in PIVOTS {
            if next.is_auto(pivot) {
                next.remove(pivot);
                tracing::debug!(step = %pivot, "Removed auto-selected step");
            }
        }
    }

    Ok(next)
}

fn add_auto(state: &mut SelectionState, pivot: &str, reason: &str) {
    state.insert(pivot, Origin::Auto);
    tracing::debug!(step = %pivot, reason, "Auto-selected step");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
