//! # urlstate Engine
//!
//! Keeps a set of typed component fields in sync with the query string of
//! the current URL, in both directions.
//!
//! The URL is authoritative on first load and whenever it changes from the
//! outside (back/forward, a link to the same page); local field changes are
//! written back to the URL otherwise. Keys the component does not declare
//! pass through untouched.
//!
//! ## Design Principles
//!
//! - **No IO**: The engine never navigates; it asks a router adapter to
//! - **Synchronous**: One observation cycle is a plain function call
//! - **Host-owned state**: Fields are redeclared on every cycle, the engine
//!   keeps only what it needs to compare cycles
//!
//! ## Core Concepts
//!
//! ### Queries
//!
//! A [`Query`] maps keys to a [`QueryValue`]: a single string or, for keys
//! that repeat in the URL, a list. Two queries are equal when they hold the
//! same keys with equal values; list values compare in order. See [`diff`].
//!
//! ### Fields
//!
//! A [`Param`] declares one controlled key: its current value, the callback
//! that updates it and a [`Codec`] that maps the value to and from the query.
//! Built-in codecs cover strings, numbers, booleans, dates, JSON records,
//! string and number lists and free-form [`Value`]s. Declarations go into a
//! [`Params`] registry.
//!
//! ### Adapters
//!
//! An [`Adapter`] gives the engine the URL's query, tells it whether the
//! router is ready and receives the query to navigate to. Several bindings
//! can share one through an [`AdapterContext`].
//!
//! ### Reconciliation
//!
//! A [`Binding`] holds the state that survives between cycles and runs each
//! cycle with [`Binding::observe`]. When a key disappears from the URL,
//! [`Mode::Reset`] (default) resets the field and [`Mode::Merge`] keeps it.
//!
//! ## Quick Start
//!
//! ```rust
//! use urlstate_engine::{Adapter, Binding, CycleOutcome, Param, Params, Query};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! // 1. The URL, owned by the router
//! let url = Rc::new(RefCell::new(Query::parse("?page=3&ref=home").unwrap()));
//! let adapter = || {
//!     let target = url.clone();
//!     Adapter::new()
//!         .with_query(url.borrow().clone())
//!         .with_on_change(move |query, _triggered_by_url| *target.borrow_mut() = query)
//! };
//!
//! // 2. Component state
//! let page = RefCell::new(1.0);
//! let render = || {
//!     Params::new().with(
//!         "page",
//!         Param::number(*page.borrow(), |v| *page.borrow_mut() = v.unwrap_or_default()),
//!     )
//! };
//!
//! // 3. Observe until nothing changes
//! let mut binding = Binding::new();
//! let reports = binding.settle_default(render, adapter).unwrap();
//! assert_eq!(reports[0].outcome, CycleOutcome::Hydrated);
//! assert_eq!(*page.borrow(), 3.0);
//!
//! // 4. Local changes are pushed back, other keys are kept
//! *page.borrow_mut() = 4.0;
//! binding.settle_default(render, adapter).unwrap();
//! assert_eq!(url.borrow().to_query_string(), "ref=home&page=4");
//! ```
//!
//! ## FFI
//!
//! The [`ffi`] module exposes query parsing, encoding, equality and value
//! serialization as C-compatible functions exchanging JSON strings.

pub mod adapter;
pub mod codec;
pub mod diff;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod param;
pub mod query;
pub mod value;

// Re-export main types at crate root
pub use adapter::{Adapter, AdapterContext, ChangeHandler, Mode, ResolvedAdapter, SerializeFn};
pub use codec::{
    BoolCodec, Codec, DateCodec, FieldValue, JsonRecordCodec, Nullability, NumArrCodec, NumCodec,
    StrArrCodec, StrCodec, ValueCodec,
};
pub use diff::{changed_keys, snapshots_equal, values_equal};
pub use engine::{Binding, CycleOutcome, CycleReport, DEFAULT_MAX_CYCLES};
pub use error::Error;
pub use param::{Param, Params, QueryParam};
pub use query::{Query, QueryValue};
pub use value::{base_serialize, Value};

/// Key of a query parameter.
pub type QueryKey = String;
