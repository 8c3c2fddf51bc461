use serde::Serialize;
use std::any::Any;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

use crate::backend::VectorBackend;
use crate::console_log;
use crate::dialog::BrowserDialog;
use crate::events::{EventKind, LayerEvent};
use crate::feature::FeatureId;
use crate::geojson_features::{features_from_geojson, features_to_geojson};
use crate::memory_backend::MemoryBackend;
use crate::models::LayerSummary;
use crate::style::{Style, StyleOptions};
use crate::vector_layer::{LayerOptions, LayerParameters, VectorLayer};

/// Vector layer exposed to JavaScript, backed by the in-memory backend
#[wasm_bindgen(js_name = VectorLayer)]
pub struct JsVectorLayer {
    layer: VectorLayer,
    backend: Rc<MemoryBackend>,
}

fn parse_json(text: &str) -> Result<serde_json::Value, JsValue> {
    serde_json::from_str(text).map_err(|e| JsValue::from_str(&format!("Invalid JSON: {}", e)))
}

// Plain JS objects rather than Maps for JSON-shaped results
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(JsValue::from)
}

// JS ids arrive as strings or numbers; anything else counts as "no id"
fn feature_id(value: &JsValue) -> FeatureId {
    if let Some(text) = value.as_string() {
        return FeatureId::Text(text);
    }
    match value.as_f64() {
        Some(n) if n.fract() == 0.0 => FeatureId::Number(n as i64),
        Some(n) => FeatureId::Text(n.to_string()),
        None => FeatureId::Text(String::new()),
    }
}

#[wasm_bindgen(js_class = VectorLayer)]
impl JsVectorLayer {
    #[wasm_bindgen(constructor)]
    pub fn new(parameters: JsValue, options: JsValue) -> Result<JsVectorLayer, JsValue> {
        let parameters: LayerParameters = serde_wasm_bindgen::from_value(parameters)?;
        let mut options: LayerOptions = if options.is_undefined() || options.is_null() {
            LayerOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)?
        };
        options.dialog = Some(Rc::new(BrowserDialog));

        let backend = Rc::new(MemoryBackend::new(&options));
        let shared: Rc<dyn VectorBackend> = backend.clone();
        let layer = VectorLayer::new(parameters, options, Some(shared))?;
        console_log!("Vector layer '{}' created", layer.name());

        Ok(JsVectorLayer { layer, backend })
    }

    #[wasm_bindgen(getter)]
    pub fn name(&self) -> String {
        self.layer.name().to_string()
    }

    #[wasm_bindgen(getter = type)]
    pub fn layer_type(&self) -> String {
        self.layer.layer_type().to_string()
    }

    /// `layer.type = ...` throws unless the value is empty or "Vector"
    #[wasm_bindgen(setter = type)]
    pub fn set_layer_type(&self, value: Option<String>) -> Result<(), JsValue> {
        self.layer.set_type(value.as_deref()).map_err(JsValue::from)
    }

    #[wasm_bindgen(js_name = addFeatures)]
    pub fn add_features(&self, geojson: &str, update: Option<bool>) -> Result<(), JsValue> {
        let features = features_from_geojson(&parse_json(geojson)?)?;
        self.layer.add_features(&features, update.unwrap_or(false));
        Ok(())
    }

    /// Feed the layer its data; the first call completes loading
    pub fn load(&self, geojson: &str) -> Result<(), JsValue> {
        let features = features_from_geojson(&parse_json(geojson)?)?;
        self.backend.load(&features);
        Ok(())
    }

    #[wasm_bindgen(js_name = getFeatures)]
    pub fn get_features(&self, skip_filter: Option<bool>) -> String {
        let features = self.layer.get_features(skip_filter.unwrap_or(false));
        features_to_geojson(&features).to_string()
    }

    #[wasm_bindgen(js_name = getFeatureById)]
    pub fn get_feature_by_id(&self, id: JsValue) -> Option<String> {
        self.layer
            .get_feature_by_id(&feature_id(&id))
            .map(|f| crate::geojson_features::feature_to_geojson(&f).to_string())
    }

    #[wasm_bindgen(js_name = removeFeaturesById)]
    pub fn remove_features_by_id(&self, ids: Vec<JsValue>) {
        let features: Vec<_> = ids
            .iter()
            .filter_map(|id| self.layer.get_feature_by_id(&feature_id(id)))
            .collect();
        self.layer.remove_features(&features);
    }

    pub fn clear(&self) {
        self.layer.clear();
    }

    pub fn refresh(&self) {
        self.layer.refresh();
    }

    pub fn redraw(&self) {
        self.layer.redraw();
    }

    #[wasm_bindgen(js_name = setFilter)]
    pub fn set_filter(&self, filter: JsValue) {
        match serde_wasm_bindgen::from_value::<serde_json::Value>(filter) {
            Ok(value) => self.layer.set_filter_value(&value),
            Err(_) => self.layer.dialog().error("The specified filter is not valid"),
        }
    }

    #[wasm_bindgen(js_name = getFilter)]
    pub fn get_filter(&self) -> Result<JsValue, JsValue> {
        match self.layer.get_filter() {
            Some(filter) => to_js(&filter),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = removeFilter)]
    pub fn remove_filter(&self) {
        self.layer.remove_filter();
    }

    #[wasm_bindgen(js_name = getFeaturesExtent)]
    pub fn get_features_extent(&self, skip_filter: Option<bool>) -> Option<Vec<f64>> {
        self.layer
            .get_features_extent(skip_filter.unwrap_or(false))
            .map(|extent| <[f64; 4]>::from(extent).to_vec())
    }

    /// `null`/`undefined` clears the layer style, an options object sets one
    #[wasm_bindgen(js_name = setStyle)]
    pub fn set_style(&self, options: JsValue, apply_to_feature: Option<bool>) -> Result<(), JsValue> {
        let apply_to_feature = apply_to_feature.unwrap_or(false);
        if options.is_null() || options.is_undefined() {
            self.layer.set_style(None, apply_to_feature);
            return Ok(());
        }
        let options: StyleOptions = serde_wasm_bindgen::from_value(options)?;
        let style = Style::from_options(options, self.layer.geometry_type());
        self.layer.set_style(Some(style), apply_to_feature);
        Ok(())
    }

    #[wasm_bindgen(js_name = getStyle)]
    pub fn get_style(&self) -> Result<JsValue, JsValue> {
        match self.layer.get_style().and_then(|s| s.options()) {
            Some(options) => to_js(&options),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = clearStyle)]
    pub fn clear_style(&self) {
        self.layer.clear_style();
    }

    #[wasm_bindgen(js_name = getLegendURL)]
    pub fn get_legend_url(&self) -> String {
        self.layer.get_legend_url()
    }

    pub fn summary(&self) -> Result<JsValue, JsValue> {
        to_js(&LayerSummary::of(&self.layer))
    }

    /// Subscribe to `load` (GeoJSON string argument) or `change:style`
    /// (style options argument)
    pub fn on(&self, event: &str, callback: js_sys::Function) -> Result<(), JsValue> {
        let kind = EventKind::from_name(event)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown layer event '{}'", event)))?;

        self.layer.on(kind, move |event| {
            let argument = match event {
                LayerEvent::Load(features) => JsValue::from_str(&features_to_geojson(features).to_string()),
                LayerEvent::ChangeStyle { style, .. } => style
                    .options()
                    .and_then(|options| to_js(&options).ok())
                    .unwrap_or(JsValue::NULL),
            };
            if let Err(e) = callback.call1(&JsValue::NULL, &argument) {
                console_log!("Layer event listener failed: {:?}", e);
            }
        });
        Ok(())
    }

    pub fn equals(&self, other: &JsVectorLayer) -> bool {
        self.layer.equals(&other.layer as &dyn Any)
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    const POINTS: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","id":"a","geometry":{"type":"Point","coordinates":[0,0]},"properties":{"kind":"school"}},
        {"type":"Feature","id":"b","geometry":{"type":"Point","coordinates":[4,4]},"properties":{"kind":"park"}}
    ]}"#;

    fn layer(name: &str) -> JsVectorLayer {
        let params = to_js(&serde_json::json!({"name": name})).unwrap();
        JsVectorLayer::new(params, JsValue::UNDEFINED).unwrap()
    }

    #[wasm_bindgen_test]
    fn load_applies_the_default_style() {
        let layer = layer("points");
        assert!(layer.get_style().unwrap().is_null());

        layer.load(POINTS).unwrap();
        assert!(!layer.get_style().unwrap().is_null());
        assert!(layer.get_legend_url().starts_with("data:image/svg+xml"));
    }

    #[wasm_bindgen_test]
    fn filter_from_js_object() {
        let layer = layer("filtered");
        layer.load(POINTS).unwrap();

        let filter = to_js(&serde_json::json!({"type": "property", "key": "kind", "op": "eq", "value": "park"})).unwrap();
        layer.set_filter(filter);
        assert_eq!(layer.get_features_extent(None), Some(vec![4.0, 4.0, 4.0, 4.0]));

        layer.remove_filter();
        assert!(layer.get_filter().unwrap().is_null());
    }

    #[wasm_bindgen_test]
    fn type_is_read_only() {
        let layer = layer("typed");
        assert_eq!(layer.layer_type(), "Vector");
        assert!(layer.set_layer_type(Some("Vector".to_string())).is_ok());
        assert!(layer.set_layer_type(None).is_ok());
        assert!(layer.set_layer_type(Some("WMS".to_string())).is_err());
        assert_eq!(layer.layer_type(), "Vector");
    }
}
