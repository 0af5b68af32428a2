//! Configuration management for the router.

use std::env;
use std::fmt;
use std::rc::Rc;
use urlstate_engine::{Mode, Query};

/// Router configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// What bindings do when a key disappears from the URL
    pub mode: Mode,
    /// Always replace the current entry instead of pushing a new one
    pub replace: bool,
    /// Mark navigations as shallow
    pub shallow: bool,
    /// URL the history starts at
    pub initial_url: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Reset,
            replace: false,
            shallow: false,
            initial_url: "/".to_string(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads a `.env` file first when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mode = match var("URLSTATE_MODE") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidMode(value.clone()))?,
            None => Mode::default(),
        };

        let replace = parse_flag("URLSTATE_REPLACE", var("URLSTATE_REPLACE"))?;
        let shallow = parse_flag("URLSTATE_SHALLOW", var("URLSTATE_SHALLOW"))?;

        let initial_url = var("URLSTATE_INITIAL_URL").unwrap_or_else(|| "/".to_string());

        Ok(Self {
            mode,
            replace,
            shallow,
            initial_url,
        })
    }

    /// Adapter options matching this configuration.
    pub fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            mode: Some(self.mode),
            replace: self.replace,
            shallow: self.shallow,
            on_change: None,
        }
    }
}

fn parse_flag(name: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some("1") | Some("true") => Ok(true),
        Some("0") | Some("false") => Ok(false),
        Some(other) => Err(ConfigError::InvalidFlag {
            name,
            value: other.to_string(),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid URLSTATE_MODE value: {0} (expected reset or merge)")]
    InvalidMode(String),

    #[error("Invalid {name} value: {value} (expected true or false)")]
    InvalidFlag { name: &'static str, value: String },
}

/// Options for the adapter a [`crate::HistoryRouter`] hands to bindings.
#[derive(Clone, Default)]
pub struct AdapterOptions {
    /// Passed through to the engine; `None` leaves the engine default
    pub mode: Option<Mode>,
    /// Replace instead of push even for state-driven changes
    pub replace: bool,
    pub shallow: bool,
    /// Replaces the default navigation entirely
    pub on_change: Option<Rc<dyn Fn(Query)>>,
}

impl AdapterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn with_shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    pub fn with_on_change(mut self, on_change: impl Fn(Query) + 'static) -> Self {
        self.on_change = Some(Rc::new(on_change));
        self
    }
}

impl fmt::Debug for AdapterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterOptions")
            .field("mode", &self.mode)
            .field("replace", &self.replace)
            .field("shallow", &self.shallow)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

impl From<&RouterConfig> for AdapterOptions {
    fn from(config: &RouterConfig) -> Self {
        config.adapter_options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = RouterConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config, RouterConfig::default());
        assert_eq!(config.initial_url, "/");
    }

    #[test]
    fn reads_every_variable() {
        let config = RouterConfig::from_vars(vars(&[
            ("URLSTATE_MODE", "merge"),
            ("URLSTATE_REPLACE", "true"),
            ("URLSTATE_SHALLOW", "1"),
            ("URLSTATE_INITIAL_URL", "/items?page=2"),
        ]))
        .unwrap();

        assert_eq!(config.mode, Mode::Merge);
        assert!(config.replace);
        assert!(config.shallow);
        assert_eq!(config.initial_url, "/items?page=2");
    }

    #[test]
    fn invalid_values_are_errors() {
        let err = RouterConfig::from_vars(vars(&[("URLSTATE_MODE", "append")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidMode("append".into()));

        let err = RouterConfig::from_vars(vars(&[("URLSTATE_SHALLOW", "maybe")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid URLSTATE_SHALLOW value: maybe (expected true or false)"
        );
    }

    #[test]
    fn adapter_options_follow_config() {
        let config = RouterConfig {
            mode: Mode::Merge,
            replace: true,
            ..RouterConfig::default()
        };
        let options = AdapterOptions::from(&config);
        assert_eq!(options.mode, Some(Mode::Merge));
        assert!(options.replace);
        assert!(!options.shallow);
        assert!(options.on_change.is_none());
    }
}
