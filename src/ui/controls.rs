use crate::{
    engine::{MapControl, MapEngine},
    prelude::HashMap,
};
use std::sync::Arc;

/// Shared handle to an engine control
pub type ControlRef = Arc<dyn MapControl>;

/// Map controls by id; every add and remove is mirrored into the engine
#[derive(Default)]
pub struct ControlRegistry {
    controls: HashMap<String, ControlRef>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a control to the map.
    ///
    /// A control already stored under the same id is taken off the engine first.
    pub fn add_map_control(&mut self, id: &str, control: ControlRef, engine: &mut dyn MapEngine) {
        if let Some(previous) = self.controls.remove(id) {
            log::debug!("Replacing map control '{}'", id);
            engine.remove_control(id, previous.as_ref());
        }
        engine.add_control(id, control.as_ref());
        self.controls.insert(id.to_string(), control);
    }

    /// Removes a control from the map, returning it if it was present
    pub fn remove_map_control(&mut self, id: &str, engine: &mut dyn MapEngine) -> Option<ControlRef> {
        let Some(control) = self.controls.remove(id) else {
            log::warn!("Tried to remove unknown map control '{}'", id);
            return None;
        };
        engine.remove_control(id, control.as_ref());
        Some(control)
    }

    pub fn get_map_control(&self, id: &str) -> Option<ControlRef> {
        self.controls.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.controls.contains_key(id)
    }

    /// Ids of all controls, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.controls.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}

impl std::fmt::Debug for ControlRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlRegistry")
            .field("controls", &self.ids())
            .finish()
    }
}
