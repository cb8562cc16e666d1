pub mod base;
pub mod registry;

pub use base::{shared, BasePlugin, DeferredAction, Plugin, PluginContext, SharedPlugin};
pub use registry::{LifecyclePhase, PluginFailure, PluginRegistry};
