//! Map module builder for fluent configuration
//!
//! Construction is the only place where a map module can fail hard: the
//! options are validated, the engine creates its map and the ladder is
//! derived. Everything after `build` degrades to no-ops on bad input.

use crate::{
    background::geolocation::GeolocationProvider,
    core::{
        config::{MapModuleOptions, Units},
        constants::DEFAULT_IMAGE_URL,
        extent::MapExtent,
        map::MapModule,
    },
    engine::MapEngine,
    plugins::SharedPlugin,
    ui::style::ToolStyle,
    MapError, Result,
};

/// Builder for creating and configuring MapModule instances
pub struct MapModuleBuilder {
    id: String,
    image_url: Option<String>,
    map_element_id: Option<String>,
    options: MapModuleOptions,
    engine: Option<Box<dyn MapEngine>>,
    geolocation: Option<Box<dyn GeolocationProvider>>,
    plugins: Vec<SharedPlugin>,
}

impl MapModuleBuilder {
    /// The module will be named `<id>MapModule`
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image_url: None,
            map_element_id: None,
            options: MapModuleOptions::default(),
            engine: None,
            geolocation: None,
            plugins: Vec::new(),
        }
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Id of the element the engine renders into
    pub fn with_map_element_id(mut self, id: impl Into<String>) -> Self {
        self.map_element_id = Some(id.into());
        self
    }

    /// Replaces all options at once
    pub fn with_options(mut self, options: MapModuleOptions) -> Self {
        self.options = options;
        self
    }

    /// Parses options from bundle configuration JSON
    pub fn with_options_json(mut self, json: &str) -> Result<Self> {
        self.options = MapModuleOptions::from_json(json)?;
        Ok(self)
    }

    pub fn with_resolutions(mut self, resolutions: Vec<f64>) -> Self {
        self.options.resolutions = Some(resolutions);
        self
    }

    pub fn with_max_extent(mut self, extent: MapExtent) -> Self {
        self.options.max_extent = Some(extent);
        self
    }

    pub fn with_srs_name(mut self, srs_name: impl Into<String>) -> Self {
        self.options.srs_name = Some(srs_name.into());
        self
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.options.units = Some(units);
        self
    }

    pub fn with_style(mut self, style: ToolStyle) -> Self {
        self.options.style = Some(style);
        self
    }

    pub fn with_engine<E: MapEngine + 'static>(mut self, engine: E) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    pub fn with_boxed_engine(mut self, engine: Box<dyn MapEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_geolocation_provider<P: GeolocationProvider + 'static>(mut self, provider: P) -> Self {
        self.geolocation = Some(Box::new(provider));
        self
    }

    /// Plugins registered in the given order once the module is built
    pub fn with_plugin(mut self, plugin: SharedPlugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Validates the configuration, creates the engine map and registers plugins
    pub fn build(self) -> Result<MapModule> {
        if self.id.trim().is_empty() {
            return Err(MapError::Configuration(
                "map module id must not be empty".to_string(),
            ));
        }
        let engine = self.engine.ok_or_else(|| {
            MapError::Configuration("a map engine is required".to_string())
        })?;
        let options = self.options.resolve()?;

        let mut module = MapModule::new(
            self.id,
            self.image_url
                .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
            self.map_element_id,
            options,
            engine,
            self.geolocation,
        )?;
        for plugin in self.plugins {
            module.register_plugin(plugin)?;
        }
        Ok(module)
    }
}
