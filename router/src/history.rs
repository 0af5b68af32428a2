//! In-memory browser-style history.
//!
//! Each entry stores the query as a [`Query`] rather than re-parsing its
//! href, so a pushed list value reads back as a list even when it has one
//! element.

use crate::config::{AdapterOptions, RouterConfig};
use crate::error::{Result, RouterError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};
use urlstate_engine::{Adapter, AdapterContext, Query};
use uuid::Uuid;

/// How a navigation changed the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationMethod {
    /// A new entry after the current one
    Push,
    /// The current entry was overwritten
    Replace,
    /// Moved through existing entries (back/forward/go)
    Traverse,
}

/// One recorded navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    pub method: NavigationMethod,
    pub href: String,
    pub shallow: bool,
}

/// A history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Unique per entry; a replace gets a fresh key
    pub key: Uuid,
    pub pathname: String,
    pub query: Query,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    fn new(pathname: String, query: Query) -> Self {
        Self {
            key: Uuid::new_v4(),
            pathname,
            query,
            created_at: Utc::now(),
        }
    }

    /// Path plus query string, e.g. `/items?page=2`.
    pub fn href(&self) -> String {
        if self.query.is_empty() {
            self.pathname.clone()
        } else {
            format!("{}?{}", self.pathname, self.query.to_query_string())
        }
    }
}

#[derive(Debug)]
struct History {
    entries: Vec<HistoryEntry>,
    index: usize,
    ready: bool,
    navigations: Vec<Navigation>,
}

impl History {
    fn current(&self) -> &HistoryEntry {
        &self.entries[self.index]
    }
}

/// Cloneable handle to an in-memory history.
///
/// All clones share the same history, so an adapter built from one clone
/// navigates every other.
#[derive(Debug, Clone)]
pub struct HistoryRouter {
    inner: Rc<RefCell<History>>,
}

impl HistoryRouter {
    /// Create a router whose only entry is `url`. The router starts ready.
    pub fn new(url: &str) -> Result<Self> {
        let (pathname, query) = split_url(url)?;
        let pathname = pathname.unwrap_or_else(|| "/".to_string());
        debug!(href = %url, "history created");

        Ok(Self {
            inner: Rc::new(RefCell::new(History {
                entries: vec![HistoryEntry::new(pathname, query)],
                index: 0,
                ready: true,
                navigations: Vec::new(),
            })),
        })
    }

    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        Self::new(&config.initial_url)
    }

    /// Create a router and its adapter options from the environment.
    pub fn from_env() -> Result<(Self, AdapterOptions)> {
        let config = RouterConfig::from_env()?;
        Ok((Self::from_config(&config)?, config.adapter_options()))
    }

    /// [`HistoryRouter::from_env`] over any variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<(Self, AdapterOptions)> {
        let config = RouterConfig::from_vars(var)?;
        Ok((Self::from_config(&config)?, config.adapter_options()))
    }

    /// The current entry.
    pub fn location(&self) -> HistoryEntry {
        self.inner.borrow().current().clone()
    }

    pub fn href(&self) -> String {
        self.inner.borrow().current().href()
    }

    pub fn pathname(&self) -> String {
        self.inner.borrow().current().pathname.clone()
    }

    pub fn query(&self) -> Query {
        self.inner.borrow().current().query.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.borrow().ready
    }

    pub fn set_ready(&self, ready: bool) {
        self.inner.borrow_mut().ready = ready;
    }

    /// Navigate to `url`, adding an entry. A URL without a path (`?a=1`)
    /// keeps the current pathname.
    pub fn push(&self, url: &str) -> Result<()> {
        let (pathname, query) = split_url(url)?;
        self.navigate(false, pathname, query, false);
        Ok(())
    }

    /// Navigate to `url`, overwriting the current entry.
    pub fn replace(&self, url: &str) -> Result<()> {
        let (pathname, query) = split_url(url)?;
        self.navigate(true, pathname, query, false);
        Ok(())
    }

    /// Push a new query on the current pathname.
    pub fn push_query(&self, query: Query, shallow: bool) {
        self.navigate(false, None, query, shallow);
    }

    /// Replace the current entry's query, keeping the pathname.
    pub fn replace_query(&self, query: Query, shallow: bool) {
        self.navigate(true, None, query, shallow);
    }

    pub fn back(&self) -> bool {
        self.go(-1)
    }

    pub fn forward(&self) -> bool {
        self.go(1)
    }

    /// Move `delta` entries through the history. Returns `false` and stays
    /// put when the target is out of range.
    pub fn go(&self, delta: isize) -> bool {
        let mut history = self.inner.borrow_mut();
        let target = history.index as isize + delta;
        if target < 0 || target >= history.entries.len() as isize {
            warn!(delta, index = history.index, len = history.entries.len(), "history move out of range");
            return false;
        }

        history.index = target as usize;
        let href = history.current().href();
        debug!(delta, href = %href, "history moved");
        history.navigations.push(Navigation {
            method: NavigationMethod::Traverse,
            href,
            shallow: false,
        });
        true
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.inner.borrow().entries.clone()
    }

    /// Index of the current entry.
    pub fn index(&self) -> usize {
        self.inner.borrow().index
    }

    /// Every navigation since creation, oldest first.
    pub fn navigations(&self) -> Vec<Navigation> {
        self.inner.borrow().navigations.clone()
    }

    /// Write a new entry, over the current one when `replace` is set.
    fn navigate(
        &self,
        replace: bool,
        pathname: Option<String>,
        query: Query,
        shallow: bool,
    ) {
        let mut history = self.inner.borrow_mut();
        let pathname = pathname.unwrap_or_else(|| history.current().pathname.clone());
        let entry = HistoryEntry::new(pathname, query);
        let href = entry.href();

        let method = if replace {
            let index = history.index;
            history.entries[index] = entry;
            NavigationMethod::Replace
        } else {
            let next = history.index + 1;
            history.entries.truncate(next);
            history.entries.push(entry);
            history.index = next;
            NavigationMethod::Push
        };

        info!(method = ?method, href = %href, shallow, "navigated");
        history.navigations.push(Navigation {
            method,
            href,
            shallow,
        });
    }

    /// Adapter reflecting the router as it is now.
    ///
    /// The default change handler keeps the pathname and replaces the
    /// current entry when `options.replace` is set or the change came from
    /// the URL; otherwise it pushes. A custom `options.on_change` takes over
    /// navigation entirely.
    pub fn adapter(&self, options: &AdapterOptions) -> Adapter {
        let mut adapter = Adapter::new()
            .with_ready(self.is_ready())
            .with_query(self.query());
        if let Some(mode) = options.mode {
            adapter = adapter.with_mode(mode);
        }

        match options.on_change.clone() {
            Some(on_change) => adapter.with_on_change(move |query, _| on_change(query)),
            None => {
                let router = self.clone();
                let replace = options.replace;
                let shallow = options.shallow;
                adapter.with_on_change(move |query, triggered_by_url| {
                    if replace || triggered_by_url {
                        router.replace_query(query, shallow);
                    } else {
                        router.push_query(query, shallow);
                    }
                })
            }
        }
    }

    /// Ambient adapter provider for bindings that share this router.
    pub fn context(&self, options: AdapterOptions) -> AdapterContext {
        let router = self.clone();
        AdapterContext::new(move || router.adapter(&options))
    }
}

/// Split a URL into its pathname (if any) and parsed query. The fragment is
/// dropped.
fn split_url(url: &str) -> Result<(Option<String>, Query)> {
    let url = url.split('#').next().unwrap_or_default();
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };

    let pathname = match path {
        "" => None,
        p if p.starts_with('/') => Some(p.to_string()),
        p => return Err(RouterError::InvalidUrl(format!("path must start with '/': {}", p))),
    };

    let query = Query::parse(query).map_err(|e| RouterError::InvalidUrl(e.to_string()))?;
    Ok((pathname, query))
}
