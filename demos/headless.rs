use mapmodule::prelude::*;
use std::any::Any;

/// Engine layer standing in for an OpenLayers WMS layer
struct WmsLayer(String);

impl EngineLayer for WmsLayer {
    fn id(&self) -> &str {
        &self.0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Minimal layer plugin putting one engine layer on the map per WMS layer
#[derive(Default)]
struct WmsLayerPlugin {
    module: Option<ModuleHandle>,
    layers: HashMap<String, EngineLayerRef>,
}

impl Plugin for WmsLayerPlugin {
    fn name(&self) -> &str {
        "WmsLayerPlugin"
    }

    fn set_map_module(&mut self, module: Option<ModuleHandle>) {
        self.module = module;
    }

    fn map_module(&self) -> Option<&ModuleHandle> {
        self.module.as_ref()
    }

    fn is_layer_plugin(&self) -> bool {
        true
    }

    fn is_layer_supported(&self, layer: &MapLayer) -> bool {
        layer.is_type("wmslayer")
    }

    fn add_map_layer_to_map(
        &mut self,
        layer: &MapLayer,
        _keep_layers_order: bool,
        is_basemap: bool,
        ctx: &mut PluginContext<'_>,
    ) -> mapmodule::Result<Option<DeferredAction>> {
        let engine_layer: EngineLayerRef = Arc::new(WmsLayer(layer.id.clone()));
        ctx.engine.add_layer(engine_layer.clone(), !is_basemap);
        self.layers.insert(layer.id.clone(), engine_layer);
        Ok(None)
    }

    fn engine_layers(&self, layer: &MapLayer) -> Vec<EngineLayerRef> {
        self.layers.get(&layer.id).cloned().into_iter().collect()
    }
}

/// Example of driving a map module without any UI
fn main() -> mapmodule::Result<()> {
    env_logger::init();

    println!("🗺️ mapmodule headless example");
    println!("=============================");

    let engine = HeadlessEngine::new(Size::new(1024.0, 768.0));
    let mut module = MapModuleBuilder::new("main")
        .with_map_element_id("mapdiv")
        .with_engine(engine.clone())
        .with_plugin(shared(WmsLayerPlugin::default()))
        .with_geolocation_provider(FixedPositionProvider::new(GeoPosition::new(
            385_000.0, 6_672_000.0,
        )))
        .build()?;

    module.on(EventKind::AfterMapMove, |event, _| {
        if let MapEvent::AfterMapMove { center, zoom, scale, .. } = event {
            println!(
                "   moved to ({:.0}, {:.0}) zoom {} scale 1:{:.0}",
                center.lon, center.lat, zoom, scale
            );
        }
    });

    module.start()?;
    println!("✅ {} started", module.name());
    println!("   {} zoom levels in {}", module.scales().len(), module.projection());

    println!("\n🎯 Moving the map:");
    module.center_map(LonLat::new(385_000.0, 6_672_000.0), Some(8), false);
    module.adjust_zoom_level(2, false);
    module.zoom_to_scale(50_000.0, true, false);
    module.pan_map_by_pixels(120.0, -40.0, false, false, true);

    println!("\n🧱 Layers:");
    module.add_map_layer(MapLayer::new("orthophoto", "wmslayer"), false, true);
    module.add_map_layer(MapLayer::new("roads", "wmslayer"), false, false);
    module.add_map_layer(MapLayer::new("buildings", "wmslayer"), false, false);
    println!("   engine order: {:?}", engine.layer_ids());

    let order = ["orthophoto", "buildings", "roads"].map(String::from);
    module.rearrange_map_layers(&order);
    println!("   after rearrange: {:?}", engine.layer_ids());

    println!("\n📍 User location:");
    module.handle_request(MapRequest::GetUserLocation { center_map: true });
    let delivered = module.process_pending();
    println!("   {} location answer(s) delivered", delivered);

    module.stop()?;
    println!("\n✅ Done, final state: {:?}", module.state());
    Ok(())
}
