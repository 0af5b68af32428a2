//! The reconciliation state machine.
//!
//! A [`Binding`] keeps the per-binding state that survives between
//! observation cycles. Each call to [`Binding::observe`] takes the current
//! field declarations and the adapter, and runs one cycle:
//!
//! 1. Hydrate from the URL on the first cycle the router is ready
//! 2. Otherwise, if the URL changed since the last cycle, pull changed
//!    controlled keys into the fields
//! 3. Otherwise, if the fields serialize to something other than the URL,
//!    push the merged query to the adapter
//! 4. Otherwise the binding is stable
//!
//! A URL change always wins over a state change in the same cycle; the push
//! is re-evaluated on the next cycle.

use crate::{
    diff, error::Result, Adapter, AdapterContext, Error, Mode, Params, Query, QueryKey,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper bound used by [`Binding::settle_default`].
pub const DEFAULT_MAX_CYCLES: usize = 16;

/// Which branch an observation cycle took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CycleOutcome {
    /// The router was not ready; nothing happened
    NotReady,
    /// First ready cycle: fields were loaded from the URL
    Hydrated,
    /// The URL changed and changed controlled keys were pulled
    Pulled,
    /// Field state differed from the URL and a new query was pushed
    Pushed,
    /// Nothing to do in either direction
    Stable,
}

/// What one observation cycle did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Keys whose change callback fired
    pub changed: Vec<QueryKey>,
    /// Keys that were reset to their default
    pub reset: Vec<QueryKey>,
    /// The query handed to the adapter, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pushed: Option<Query>,
    /// The flag passed along with `pushed`
    pub triggered_by_url: bool,
    /// Keys whose URL value could not be deserialized and were skipped
    pub skipped_failures: Vec<QueryKey>,
}

impl CycleReport {
    fn new(outcome: CycleOutcome) -> Self {
        Self {
            outcome,
            changed: Vec::new(),
            reset: Vec::new(),
            pushed: None,
            triggered_by_url: false,
            skipped_failures: Vec::new(),
        }
    }

    /// Whether the cycle invoked any callback.
    pub fn fired(&self) -> bool {
        !self.changed.is_empty() || !self.reset.is_empty() || self.pushed.is_some()
    }
}

/// Reconciliation state for one logical binding.
#[derive(Debug, Clone, Default)]
pub struct Binding {
    context: Option<AdapterContext>,
    previous_query: Query,
    initialized: bool,
    previous_pull_was_from_url: bool,
    stable: bool,
    cycles: u64,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binding that inherits adapter fields from a shared context.
    pub fn with_context(context: AdapterContext) -> Self {
        Self {
            context: Some(context),
            ..Self::default()
        }
    }

    pub fn context(&self) -> Option<&AdapterContext> {
        self.context.as_ref()
    }

    pub fn is_stable(&self) -> bool {
        self.stable
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The URL query observed by the last pull or hydration.
    pub fn previous_query(&self) -> &Query {
        &self.previous_query
    }

    /// Number of cycles observed since creation or the last reinitialize.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Drop all reconciliation state, keeping the shared context. Used when
    /// the binding is reused for a different logical page.
    pub fn reinitialize(&mut self) {
        *self = Self {
            context: self.context.take(),
            ..Self::default()
        };
    }

    /// Run one observation cycle.
    ///
    /// Fails only when neither `adapter` nor the shared context provides a
    /// query and a change handler. Deserialization failures are skipped and
    /// listed in the report.
    pub fn observe(&mut self, params: &mut Params<'_>, adapter: &Adapter) -> Result<CycleReport> {
        let ambient = self.context.as_ref().map(AdapterContext::current);
        let adapter = adapter.resolve(ambient.as_ref())?;
        self.cycles += 1;

        if !adapter.is_router_ready {
            self.stable = false;
            return Ok(CycleReport::new(CycleOutcome::NotReady));
        }

        let query = adapter.url_query;
        let global = adapter.custom_serializer.as_ref();

        if !self.initialized {
            let mut report = CycleReport::new(CycleOutcome::Hydrated);
            let keys: Vec<QueryKey> = params.keys().cloned().collect();
            for key in keys {
                let Some(raw) = query.get(&key) else {
                    continue;
                };
                match params.apply(&key, raw) {
                    Ok(_) => report.changed.push(key),
                    Err(err) => {
                        debug!(key = %key, error = %err, "skipping undeserializable value");
                        report.skipped_failures.push(key);
                    }
                }
            }
            debug!(fields = params.len(), hydrated = report.changed.len(), "hydrated from url");

            self.previous_query = query;
            self.initialized = true;
            self.previous_pull_was_from_url = true;
            self.stable = false;
            return Ok(report);
        }

        if !diff::snapshots_equal(&query, &self.previous_query) {
            let mut report = CycleReport::new(CycleOutcome::Pulled);
            let changed: Vec<QueryKey> = diff::changed_keys(&query, &self.previous_query)
                .into_iter()
                .filter(|key| params.contains(key))
                .collect();
            for key in changed {
                match query.get(&key) {
                    None if adapter.mode == Mode::Reset => {
                        debug!(key = %key, "key removed from url, resetting");
                        params.reset(&key);
                        report.reset.push(key);
                    }
                    None => {
                        debug!(key = %key, "key removed from url, keeping value");
                    }
                    Some(raw) => {
                        let current = params.serialize_field(&key, global);
                        if current.is_some_and(|current| diff::values_equal(&current, raw)) {
                            continue;
                        }
                        match params.apply(&key, raw) {
                            Ok(_) => {
                                debug!(key = %key, "pulled value from url");
                                report.changed.push(key);
                            }
                            Err(err) => {
                                debug!(key = %key, error = %err, "skipping undeserializable value");
                                report.skipped_failures.push(key);
                            }
                        }
                    }
                }
            }

            self.previous_query = query;
            self.previous_pull_was_from_url = true;
            self.stable = false;
            return Ok(report);
        }

        let state = params.serialize_state(global);
        let controlled = query.filtered(|key| params.contains(key));
        if !diff::snapshots_equal(&state, &controlled) {
            let uncontrolled = params.uncontrolled_keys(&query);
            let mut next = query.filtered(|key| uncontrolled.iter().any(|k| k == key));
            next.merge(state);

            let triggered_by_url = self.previous_pull_was_from_url;
            debug!(query = %next, triggered_by_url, "pushing state to url");
            (adapter.on_change)(next.clone(), triggered_by_url);

            self.previous_pull_was_from_url = false;
            self.stable = false;

            let mut report = CycleReport::new(CycleOutcome::Pushed);
            report.pushed = Some(next);
            report.triggered_by_url = triggered_by_url;
            return Ok(report);
        }

        self.previous_pull_was_from_url = false;
        self.stable = true;
        Ok(CycleReport::new(CycleOutcome::Stable))
    }

    /// Drive the binding to a fixed point.
    ///
    /// Each iteration renders fresh declarations with `render` and reads
    /// the adapter with `adapter`, then observes one cycle. Stops at the
    /// first stable cycle, or when the router is not ready. A binding that
    /// keeps changing for `max_cycles` cycles fails with
    /// [`Error::NotSettled`]; a field whose custom serializer and
    /// deserializer are not inverses is the usual cause.
    pub fn settle<'a, R, A>(
        &mut self,
        max_cycles: usize,
        mut render: R,
        mut adapter: A,
    ) -> Result<Vec<CycleReport>>
    where
        R: FnMut() -> Params<'a>,
        A: FnMut() -> Adapter,
    {
        let mut reports = Vec::new();
        for _ in 0..max_cycles {
            let mut params = render();
            let report = self.observe(&mut params, &adapter())?;
            let done = matches!(report.outcome, CycleOutcome::Stable | CycleOutcome::NotReady);
            reports.push(report);
            if done {
                return Ok(reports);
            }
        }
        Err(Error::NotSettled { cycles: max_cycles })
    }

    /// [`Binding::settle`] with [`DEFAULT_MAX_CYCLES`].
    pub fn settle_default<'a, R, A>(&mut self, render: R, adapter: A) -> Result<Vec<CycleReport>>
    where
        R: FnMut() -> Params<'a>,
        A: FnMut() -> Adapter,
    {
        self.settle(DEFAULT_MAX_CYCLES, render, adapter)
    }
}
