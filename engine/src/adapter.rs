//! The router adapter contract.
//!
//! The engine reads the URL's query and readiness from an adapter and asks it
//! to navigate; it never touches navigation state itself. An [`Adapter`] is
//! partial: a binding may receive one directly and inherit the rest from an
//! ambient [`AdapterContext`] shared by several bindings. Direct fields win,
//! field by field.

use crate::{error::Result, Error, Query, QueryValue, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Navigation request: the new query and whether the change that led to it
/// came from the URL (the router should then `replace` rather than `push`).
pub type ChangeHandler = Rc<dyn Fn(Query, bool)>;

/// Global serializer for fields without a serializer of their own.
pub type SerializeFn = Rc<dyn Fn(&Value) -> Option<QueryValue>>;

/// What happens to a controlled field whose key disappears from the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    /// Reset the field to its default value (default)
    #[default]
    Reset,
    /// Keep the field's value; it is written back to the URL on the next push
    Merge,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" => Ok(Mode::Reset),
            "merge" => Ok(Mode::Merge),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Reset => write!(f, "reset"),
            Mode::Merge => write!(f, "merge"),
        }
    }
}

/// A possibly partial adapter.
#[derive(Clone, Default)]
pub struct Adapter {
    pub is_router_ready: Option<bool>,
    pub url_query: Option<Query>,
    pub on_change: Option<ChangeHandler>,
    pub mode: Option<Mode>,
    pub custom_serializer: Option<SerializeFn>,
}

impl Adapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ready(mut self, ready: bool) -> Self {
        self.is_router_ready = Some(ready);
        self
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.url_query = Some(query);
        self
    }

    pub fn with_on_change(mut self, on_change: impl Fn(Query, bool) + 'static) -> Self {
        self.on_change = Some(Rc::new(on_change));
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_serializer(
        mut self,
        serializer: impl Fn(&Value) -> Option<QueryValue> + 'static,
    ) -> Self {
        self.custom_serializer = Some(Rc::new(serializer));
        self
    }

    /// Overlay this adapter on an ambient one and fill in defaults.
    ///
    /// Readiness defaults to `true` and mode to [`Mode::Reset`]. A missing
    /// query or change handler is a configuration error.
    pub fn resolve(&self, ambient: Option<&Adapter>) -> Result<ResolvedAdapter> {
        let url_query = overlay(&self.url_query, ambient, |a| &a.url_query);
        let on_change = overlay(&self.on_change, ambient, |a| &a.on_change);
        let (url_query, on_change) = match (url_query, on_change) {
            (Some(query), Some(handler)) => (query, handler),
            (_, None) => return Err(Error::MissingAdapter { field: "onChange" }),
            (None, _) => return Err(Error::MissingAdapter { field: "urlQuery" }),
        };

        Ok(ResolvedAdapter {
            is_router_ready: overlay(&self.is_router_ready, ambient, |a| &a.is_router_ready)
                .unwrap_or(true),
            url_query,
            on_change,
            mode: overlay(&self.mode, ambient, |a| &a.mode).unwrap_or_default(),
            custom_serializer: overlay(&self.custom_serializer, ambient, |a| {
                &a.custom_serializer
            }),
        })
    }
}

fn overlay<T: Clone>(
    direct: &Option<T>,
    ambient: Option<&Adapter>,
    field: impl Fn(&Adapter) -> &Option<T>,
) -> Option<T> {
    direct
        .clone()
        .or_else(|| ambient.and_then(|a| field(a).clone()))
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("is_router_ready", &self.is_router_ready)
            .field("url_query", &self.url_query)
            .field("on_change", &self.on_change.is_some())
            .field("mode", &self.mode)
            .field("custom_serializer", &self.custom_serializer.is_some())
            .finish()
    }
}

/// A complete adapter for one observation cycle.
#[derive(Clone)]
pub struct ResolvedAdapter {
    pub is_router_ready: bool,
    pub url_query: Query,
    pub on_change: ChangeHandler,
    pub mode: Mode,
    pub custom_serializer: Option<SerializeFn>,
}

impl fmt::Debug for ResolvedAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedAdapter")
            .field("is_router_ready", &self.is_router_ready)
            .field("url_query", &self.url_query)
            .field("mode", &self.mode)
            .field("custom_serializer", &self.custom_serializer.is_some())
            .finish()
    }
}

/// Ambient adapter shared by every binding in a subtree.
///
/// Holds a provider rather than a fixed adapter so each cycle sees the
/// router's current query. Cloning is cheap and clones share the provider.
#[derive(Clone)]
pub struct AdapterContext {
    provider: Rc<dyn Fn() -> Adapter>,
}

impl AdapterContext {
    pub fn new(provider: impl Fn() -> Adapter + 'static) -> Self {
        Self {
            provider: Rc::new(provider),
        }
    }

    /// Context that always hands out the same adapter.
    pub fn fixed(adapter: Adapter) -> Self {
        Self::new(move || adapter.clone())
    }

    pub fn current(&self) -> Adapter {
        (self.provider)()
    }
}

impl fmt::Debug for AdapterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterContext").finish_non_exhaustive()
    }
}
