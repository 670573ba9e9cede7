//! Process-wide table of the built-in plug-ins

use crate::core::microstructure::{Exponential, Homogeneous, MicrostructureConstructor};
use crate::core::plugin::Registry;
use crate::emmodel::{builtin_emmodels, EmModelConstructor};
use crate::interface::{builtin_interfaces, InterfaceConstructor};
use crate::rtsolver::{builtin_rtsolvers, RtSolverConstructor};
use std::sync::{Arc, OnceLock};

/// One registry per plug-in kind
#[derive(Clone)]
pub struct PluginRegistry {
    pub emmodels: Registry<EmModelConstructor>,
    pub rtsolvers: Registry<RtSolverConstructor>,
    pub interfaces: Registry<InterfaceConstructor>,
    pub microstructures: Registry<MicrostructureConstructor>,
}

impl PluginRegistry {
    /// Registry holding every plug-in shipped with the crate
    pub fn builtin() -> Self {
        let mut microstructures: Registry<MicrostructureConstructor> = Registry::new("microstructure");
        microstructures
            .register("exponential", Exponential::from_options)
            .register("homogeneous", Homogeneous::from_options)
            .set_default("exponential");

        let registry = Self {
            emmodels: builtin_emmodels(),
            rtsolvers: builtin_rtsolvers(),
            interfaces: builtin_interfaces(),
            microstructures,
        };
        log::debug!(
            "Plug-ins: emmodel {:?}, rtsolver {:?}, interface {:?}, microstructure {:?}",
            registry.emmodels.names(),
            registry.rtsolvers.names(),
            registry.interfaces.names(),
            registry.microstructures.names()
        );
        registry
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("emmodels", &self.emmodels.names())
            .field("rtsolvers", &self.rtsolvers.names())
            .field("interfaces", &self.interfaces.names())
            .field("microstructures", &self.microstructures.names())
            .finish()
    }
}

/// Built-in registry, populated on first use
pub fn default_registry() -> Arc<PluginRegistry> {
    static REGISTRY: OnceLock<Arc<PluginRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Arc::new(PluginRegistry::builtin())).clone()
}
