use std::collections::BTreeMap;
use std::sync::Arc;

use crate::foundation::error::{MontageError, MontageResult};
use crate::reader::Reader;
use crate::reader::dummy::DummyReader;
use crate::reader::still::ImageReader;

/// Builds a reader from its JSON descriptor.
pub type ReaderFactory =
    Arc<dyn Fn(&serde_json::Value) -> MontageResult<Box<dyn Reader>> + Send + Sync>;

/// Maps reader `"type"` names to factories.
///
/// The surrounding application populates it; [`ReaderRegistry::with_builtins`] registers the
/// readers shipped with the crate.
#[derive(Clone, Default)]
pub struct ReaderRegistry {
    factories: BTreeMap<String, ReaderFactory>,
}

impl std::fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderRegistry")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ReaderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `DummyReader` and `ImageReader`.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register("DummyReader", |v| {
            Ok(Box::new(DummyReader::from_json_value(v)?) as Box<dyn Reader>)
        });
        reg.register("ImageReader", |v| {
            Ok(Box::new(ImageReader::from_json_value(v)?) as Box<dyn Reader>)
        });
        reg
    }

    /// Add or replace the factory for `type_name`.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> MontageResult<Box<dyn Reader>> + Send + Sync + 'static,
    {
        self.factories.insert(type_name.into(), Arc::new(factory));
    }

    /// Registered type names.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a reader from a descriptor carrying a `"type"` key.
    pub fn create(&self, value: &serde_json::Value) -> MontageResult<Box<dyn Reader>> {
        let type_name = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                MontageError::invalid_json("ReaderRegistry::create", "reader has no \"type\" key")
            })?;
        let factory = self.factories.get(type_name).ok_or_else(|| {
            MontageError::invalid_json(
                "ReaderRegistry::create",
                format!("unknown reader type '{type_name}'"),
            )
        })?;
        factory(value)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/reader/registry.rs"]
mod tests;
