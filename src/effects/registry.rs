use std::collections::BTreeMap;
use std::sync::Arc;

use crate::effects::Effect;
use crate::effects::bars::Bars;
use crate::effects::blur::Blur;
use crate::effects::brightness::Brightness;
use crate::effects::crop::Crop;
use crate::effects::hue::Hue;
use crate::effects::negate::Negate;
use crate::effects::pixelate::Pixelate;
use crate::effects::saturation::Saturation;
use crate::effects::shift::Shift;
use crate::effects::wave::Wave;
use crate::foundation::error::{MontageError, MontageResult};

/// Builds an effect from its JSON document.
pub type EffectFactory =
    Arc<dyn Fn(&serde_json::Value) -> MontageResult<Box<dyn Effect>> + Send + Sync>;

/// Maps effect class names to factories.
#[derive(Clone, Default)]
pub struct EffectRegistry {
    factories: BTreeMap<String, EffectFactory>,
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("class_names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn build<E>(value: &serde_json::Value) -> MontageResult<Box<dyn Effect>>
where
    E: Effect + Default + 'static,
{
    let mut effect = E::default();
    effect.apply_json_value(value)?;
    Ok(Box::new(effect))
}

impl EffectRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in effect.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register("Negate", build::<Negate>);
        reg.register("Crop", build::<Crop>);
        reg.register("Bars", build::<Bars>);
        reg.register("Blur", build::<Blur>);
        reg.register("Brightness", build::<Brightness>);
        reg.register("Saturation", build::<Saturation>);
        reg.register("Hue", build::<Hue>);
        reg.register("Pixelate", build::<Pixelate>);
        reg.register("Shift", build::<Shift>);
        reg.register("Wave", build::<Wave>);
        reg
    }

    /// Add or replace the factory for `class_name`.
    pub fn register<F>(&mut self, class_name: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> MontageResult<Box<dyn Effect>> + Send + Sync + 'static,
    {
        self.factories.insert(class_name.into(), Arc::new(factory));
    }

    /// Registered class names.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build an effect from a document carrying `"type"` (or `"class_name"`).
    pub fn create(&self, value: &serde_json::Value) -> MontageResult<Box<dyn Effect>> {
        let class_name = ["type", "class_name"]
            .iter()
            .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
            .ok_or_else(|| {
                MontageError::invalid_json("EffectRegistry::create", "effect has no \"type\" key")
            })?;
        let factory = self.factories.get(class_name).ok_or_else(|| {
            MontageError::invalid_json(
                "EffectRegistry::create",
                format!("unknown effect type '{class_name}'"),
            )
        })?;
        factory(value)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/registry.rs"]
mod tests;
