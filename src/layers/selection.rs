use crate::layers::MapLayer;

/// Selected map layers, ordered from bottom to top
#[derive(Debug, Clone, Default)]
pub struct LayerSelection {
    layers: Vec<MapLayer>,
}

impl LayerSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer on top, or at the bottom for base maps.
    ///
    /// Returns false if a layer with the same id is already selected.
    pub fn add_layer(&mut self, layer: MapLayer) -> bool {
        if self.contains(&layer.id) {
            return false;
        }
        if layer.is_basemap {
            self.layers.insert(0, layer);
        } else {
            self.layers.push(layer);
        }
        true
    }

    /// Removes a layer from the selection
    pub fn remove_layer(&mut self, layer_id: &str) -> Option<MapLayer> {
        let index = self.position(layer_id)?;
        Some(self.layers.remove(index))
    }

    pub fn get_layer(&self, layer_id: &str) -> Option<&MapLayer> {
        self.layers.iter().find(|layer| layer.id == layer_id)
    }

    pub fn contains(&self, layer_id: &str) -> bool {
        self.position(layer_id).is_some()
    }

    pub fn position(&self, layer_id: &str) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id == layer_id)
    }

    /// Layers from bottom to top
    pub fn layers(&self) -> &[MapLayer] {
        &self.layers
    }

    pub fn ids(&self) -> Vec<String> {
        self.layers.iter().map(|layer| layer.id.clone()).collect()
    }

    /// Moves the listed layers into the given order.
    ///
    /// Unknown ids are skipped; selected layers missing from `order` keep
    /// their relative order above the listed ones. Returns true if the order
    /// changed.
    pub fn rearrange(&mut self, order: &[String]) -> bool {
        let before = self.ids();
        let mut remaining = std::mem::take(&mut self.layers);
        let mut arranged = Vec::with_capacity(remaining.len());
        for id in order {
            if let Some(index) = remaining.iter().position(|layer| &layer.id == id) {
                arranged.push(remaining.remove(index));
            }
        }
        arranged.extend(remaining);
        self.layers = arranged;
        self.ids() != before
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
