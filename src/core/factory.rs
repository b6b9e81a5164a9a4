//! Destination factory table
//!
//! An explicit registration table mapping a destination kind name to a
//! constructor closure. Populated at startup, looked up by name; no
//! reflection or dynamic type lookup anywhere.

use super::destination::Destination;
use super::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Constructor taking a loose config map, e.g. parsed from a config file.
pub type DestinationCtor =
    Box<dyn Fn(&Map<String, Value>) -> Result<Box<dyn Destination>> + Send + Sync>;

#[derive(Default)]
pub struct DestinationFactories {
    table: HashMap<String, DestinationCtor>,
}

impl DestinationFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with the built-in destinations pre-registered.
    pub fn with_defaults() -> Self {
        let mut factories = Self::new();

        factories.register("memory", |config| {
            let name = string_option(config, "name").unwrap_or_else(|| "memory".to_string());
            Ok(Box::new(crate::destinations::MemoryDestination::new(name)))
        });

        #[cfg(feature = "console")]
        factories.register("console", |config| {
            let colors = config
                .get("colors")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            Ok(Box::new(
                crate::destinations::ConsoleDestination::with_colors(colors),
            ))
        });

        #[cfg(feature = "file")]
        factories.register("file", |config| {
            let path = string_option(config, "path").ok_or_else(|| {
                Error::config("file destination", "missing required 'path' option")
            })?;
            Ok(Box::new(crate::destinations::FileDestination::new(path)?))
        });

        factories
    }

    /// Register a constructor under `kind`, replacing any previous one.
    pub fn register<F>(&mut self, kind: impl Into<String>, ctor: F)
    where
        F: Fn(&Map<String, Value>) -> Result<Box<dyn Destination>> + Send + Sync + 'static,
    {
        self.table.insert(kind.into(), Box::new(ctor));
    }

    /// Build a destination by kind name.
    pub fn build(&self, kind: &str, config: &Map<String, Value>) -> Result<Box<dyn Destination>> {
        let ctor = self.table.get(kind).ok_or_else(|| {
            Error::config("factory", format!("unknown destination kind '{kind}'"))
        })?;
        ctor(config)
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.table.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.table.contains_key(kind)
    }
}

fn string_option(config: &Map<String, Value>, key: &str) -> Option<String> {
    config.get(key).and_then(Value::as_str).map(String::from)
}
