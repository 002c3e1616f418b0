//! Layer construction by type tag.

use std::collections::HashMap;

use ce_ir::{LayerSpec, Mood};
use thiserror::Error;

use crate::context::AudioContext;
use crate::layer::Layer;

/// Builds one layer variant from its spec and the owning track's mood.
pub type LayerCtor = fn(&mut AudioContext, LayerSpec, Mood) -> Box<dyn Layer>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FactoryError {
    #[error("layer constructor registered without a type tag")]
    MissingTypeTag,
}

/// Registry of layer constructors keyed by type tag.
pub struct LayerFactory {
    ctors: HashMap<&'static str, LayerCtor>,
}

impl Default for LayerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerFactory {
    /// A factory with every built-in variant registered.
    pub fn new() -> Self {
        let mut factory = Self::empty();
        crate::layers::register_builtin(&mut factory);
        factory
    }

    pub fn empty() -> Self {
        Self { ctors: HashMap::new() }
    }

    /// Register `ctor` under `kind`, replacing any previous constructor.
    pub fn register(&mut self, kind: &'static str, ctor: LayerCtor) -> Result<(), FactoryError> {
        if kind.is_empty() {
            return Err(FactoryError::MissingTypeTag);
        }
        if self.ctors.insert(kind, ctor).is_some() {
            log::debug!("replaced layer constructor for {:?}", kind);
        }
        Ok(())
    }

    /// Create a layer for `spec`. Unknown kinds log a warning and give `None`.
    pub fn create(&self, ctx: &mut AudioContext, spec: &LayerSpec, mood: Mood) -> Option<Box<dyn Layer>> {
        match self.ctors.get(spec.kind) {
            Some(ctor) => Some(ctor(ctx, *spec, mood)),
            None => {
                log::warn!("unknown layer type {:?}", spec.kind);
                None
            }
        }
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.ctors.contains_key(kind)
    }

    /// Registered type tags, sorted.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.ctors.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }
}
