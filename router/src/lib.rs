//! # urlstate Router
//!
//! An in-memory, browser-style history and the default adapter that
//! connects it to [`urlstate_engine`] bindings.
//!
//! The adapter navigates the way a browser router is expected to: a change
//! that only reflects what the URL already said replaces the current entry,
//! a genuine state change pushes a new one, so back/forward walk through
//! user-visible states only.
//!
//! ```rust
//! use std::cell::RefCell;
//! use urlstate_engine::{Binding, Param, Params};
//! use urlstate_router::{AdapterOptions, HistoryRouter};
//!
//! let router = HistoryRouter::new("/search?q=boots").unwrap();
//! let options = AdapterOptions::new();
//!
//! let q = RefCell::new(String::new());
//! let render = || {
//!     Params::new().with(
//!         "q",
//!         Param::string(q.borrow().clone(), |v| *q.borrow_mut() = v.unwrap_or_default()),
//!     )
//! };
//!
//! let mut binding = Binding::new();
//! binding.settle_default(render, || router.adapter(&options)).unwrap();
//! assert_eq!(*q.borrow(), "boots");
//!
//! *q.borrow_mut() = "hats".into();
//! binding.settle_default(render, || router.adapter(&options)).unwrap();
//! assert_eq!(router.href(), "/search?q=hats");
//!
//! router.back();
//! binding.settle_default(render, || router.adapter(&options)).unwrap();
//! assert_eq!(*q.borrow(), "boots");
//! ```

pub mod config;
pub mod error;
pub mod history;

pub use config::{AdapterOptions, ConfigError, RouterConfig};
pub use error::{Result, RouterError};
pub use history::{HistoryEntry, HistoryRouter, Navigation, NavigationMethod};
