use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::backend::{self, VectorBackend};
use crate::bbox_filter::Extent;
use crate::console_log;
use crate::dialog::{ConsoleDialog, Dialog};
use crate::error::{LayerError, Result};
use crate::events::{EventEmitter, EventKind, LayerEvent, ListenerId};
use crate::feature::{Feature, FeatureId, GeometryType};
use crate::filter::Filter;
use crate::style::{default_style, Style};

/// Type reported by every vector layer
pub const LAYER_TYPE_VECTOR: &str = "Vector";

/// Name under which maps register their layer switcher control
pub const LAYER_SWITCHER: &str = "layerswitcher";

/// Marker of the placeholder legend image
pub const LEGEND_DEFAULT: &str = "img/legend-default.png";
/// Marker of the legend image shown when the legend failed to load
pub const LEGEND_ERROR: &str = "img/legend-error.png";

// Closed set of vector layer variants, each with its own default style
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    #[default]
    Vector,
    #[serde(rename = "geojson")]
    GeoJson,
    Wfs,
}

/// Generic layer parameters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerParameters {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub legend: Option<String>,
    #[serde(default)]
    pub kind: LayerKind,
    // Declared geometry type (WFS layers know it before any feature arrives)
    #[serde(default)]
    pub geometry: Option<GeometryType>,
}

impl LayerParameters {
    pub fn named(name: &str) -> Self {
        LayerParameters {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Per-layer options
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerOptions {
    /// Initial style; absent means "use the default style of the layer kind"
    #[serde(skip)]
    pub style: Option<Style>,
    #[serde(default)]
    pub legend_url: Option<String>,
    /// Where user-facing diagnostics go, the console when absent
    #[serde(skip)]
    pub dialog: Option<Rc<dyn Dialog>>,
}

impl fmt::Debug for LayerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerOptions")
            .field("style", &self.style)
            .field("legend_url", &self.legend_url)
            .field("dialog", &self.dialog.is_some())
            .finish()
    }
}

/// Where a layer stands in the style application protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StyleState {
    NoStyle,
    /// A style was requested before the backend loaded; it applies on load
    PendingLoad,
    Applied,
}

struct StyleRequest {
    style: Option<Style>,
    apply_to_feature: bool,
    is_null_style: bool,
}

#[derive(Default)]
struct LayerState {
    style: Option<Style>,
    filter: Option<Filter>,
    // requests made before the backend loaded, applied in order on the next load
    pending: Vec<StyleRequest>,
}

struct LayerShared {
    parameters: LayerParameters,
    backend: Rc<dyn VectorBackend>,
    state: RefCell<LayerState>,
    events: EventEmitter,
    dialog: Rc<dyn Dialog>,
}

/// Vector layer facade.
///
/// Validates calls, keeps style and filter state and forwards the real work
/// to its [`VectorBackend`]. Cloning gives another handle to the same layer.
#[derive(Clone)]
pub struct VectorLayer {
    shared: Rc<LayerShared>,
}

/// Non-owning handle, used by styles and backend callbacks
#[derive(Clone)]
pub struct WeakVectorLayer(Weak<LayerShared>);

impl WeakVectorLayer {
    pub fn upgrade(&self) -> Option<VectorLayer> {
        self.0.upgrade().map(|shared| VectorLayer { shared })
    }

    pub fn points_to(&self, layer: &VectorLayer) -> bool {
        std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&layer.shared))
    }
}

impl VectorLayer {
    /// Create a layer over `backend`, or over the registered backend of
    /// `parameters.kind` when none is given.
    pub fn new(
        parameters: LayerParameters,
        options: LayerOptions,
        backend: Option<Rc<dyn VectorBackend>>,
    ) -> Result<Self> {
        let backend = match backend {
            Some(backend) => backend,
            None => {
                let factory = backend::backend_factory(parameters.kind).ok_or(LayerError::BackendUnavailable)?;
                factory(&options)
            }
        };
        let dialog: Rc<dyn Dialog> = options.dialog.clone().unwrap_or_else(|| Rc::new(ConsoleDialog));

        let layer = VectorLayer {
            shared: Rc::new(LayerShared {
                parameters,
                backend,
                state: RefCell::new(LayerState::default()),
                events: EventEmitter::new(),
                dialog,
            }),
        };

        let weak = layer.downgrade();
        layer.shared.backend.on_load(Rc::new(move |features: &[Feature]| {
            if let Some(layer) = weak.upgrade() {
                layer.on_backend_loaded(features);
            }
        }));

        layer.request_style(options.style, false, false);
        Ok(layer)
    }

    pub fn name(&self) -> &str {
        &self.shared.parameters.name
    }

    pub fn kind(&self) -> LayerKind {
        self.shared.parameters.kind
    }

    pub fn parameters(&self) -> &LayerParameters {
        &self.shared.parameters
    }

    pub fn backend(&self) -> Rc<dyn VectorBackend> {
        self.shared.backend.clone()
    }

    pub fn dialog(&self) -> Rc<dyn Dialog> {
        self.shared.dialog.clone()
    }

    pub fn downgrade(&self) -> WeakVectorLayer {
        WeakVectorLayer(Rc::downgrade(&self.shared))
    }

    /// Same layer instance (not just same name)
    pub fn ptr_eq(&self, other: &VectorLayer) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn layer_type(&self) -> &'static str {
        LAYER_TYPE_VECTOR
    }

    /// The type is fixed. Re-stating it, or passing nothing, is accepted
    /// silently; any other value is an error.
    pub fn set_type(&self, new_type: Option<&str>) -> Result<()> {
        match new_type {
            Some(t) if !t.trim().is_empty() && t != LAYER_TYPE_VECTOR => Err(LayerError::TypeMismatch {
                expected: LAYER_TYPE_VECTOR.to_string(),
                found: t.to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn add_features(&self, features: &[Feature], update: bool) {
        if features.is_empty() {
            return;
        }
        self.shared.backend.add_features(features, update);
    }

    pub fn add_feature(&self, feature: Feature, update: bool) {
        self.add_features(&[feature], update);
    }

    /// Features of the layer, filtered unless `skip_filter` is set or no filter exists
    pub fn get_features(&self, skip_filter: bool) -> Vec<Feature> {
        let filter = self.get_filter();
        let skip_filter = skip_filter || filter.is_none();
        self.shared.backend.get_features(skip_filter, filter.as_ref())
    }

    pub fn get_feature_by_id(&self, id: &FeatureId) -> Option<Feature> {
        if id.is_empty() {
            self.shared.dialog.error("No ID was given to look up the feature");
            return None;
        }
        self.shared.backend.get_feature_by_id(id)
    }

    pub fn remove_features(&self, features: &[Feature]) {
        self.shared.backend.remove_features(features);
    }

    pub fn remove_feature(&self, feature: &Feature) {
        self.remove_features(std::slice::from_ref(feature));
    }

    /// Drop the filter, then every feature
    pub fn clear(&self) {
        self.remove_filter();
        let features = self.get_features(true);
        self.remove_features(&features);
    }

    pub fn refresh(&self) {
        self.shared.backend.refresh(true);
        self.redraw();
    }

    pub fn redraw(&self) {
        self.shared.backend.redraw();
        if let Some(style) = self.get_style() {
            if !style.is_cluster() {
                style.refresh(None);
            } else if let Some(old_style) = style.old_style() {
                // clusters re-render through the style they wrap
                old_style.refresh(Some(self));
            }
        }
    }

    pub fn set_filter(&self, filter: Option<Filter>) {
        self.shared.state.borrow_mut().filter = filter;

        let cluster = self.get_style().filter(|s| s.is_cluster());
        if let Some(cluster) = &cluster {
            cluster.get_impl().deactivate_change_event();
        }
        self.redraw();
        if let Some(cluster) = &cluster {
            cluster.get_impl().activate_change_event();
            // re-enabling the change hook after the source changed does not refresh by itself
            cluster.refresh(None);
        }
    }

    /// Set a filter from its JSON form. Null or empty values remove the
    /// filter; values that are not a filter are reported and ignored.
    pub fn set_filter_value(&self, value: &serde_json::Value) {
        if is_null_or_empty(value) {
            self.set_filter(None);
            return;
        }
        match serde_json::from_value::<Filter>(value.clone()) {
            Ok(filter) => self.set_filter(Some(filter)),
            Err(e) => {
                console_log!("Rejected filter {}: {}", value, e);
                self.shared.dialog.error("The specified filter is not valid");
            }
        }
    }

    pub fn get_filter(&self) -> Option<Filter> {
        self.shared.state.borrow().filter.clone()
    }

    pub fn has_filter(&self) -> bool {
        self.shared.state.borrow().filter.is_some()
    }

    pub fn remove_filter(&self) {
        self.set_filter(None);
    }

    pub fn get_features_extent(&self, skip_filter: bool) -> Option<Extent> {
        let filter = self.get_filter();
        let skip_filter = skip_filter || filter.is_none();
        self.shared.backend.get_features_extent(skip_filter, filter.as_ref())
    }

    /// True only for another vector layer with the same name
    pub fn equals(&self, obj: &dyn Any) -> bool {
        obj.downcast_ref::<VectorLayer>()
            .map_or(false, |other| other.name() == self.name())
    }

    /// Request `style` (`None` = explicitly no style, the layer default is
    /// used). Runs immediately when the backend is loaded, otherwise once on
    /// the next load, after any request made earlier.
    pub fn set_style(&self, style: Option<Style>, apply_to_feature: bool) {
        let is_null_style = style.is_none();
        self.request_style(style, apply_to_feature, is_null_style);
    }

    pub fn get_style(&self) -> Option<Style> {
        self.shared.state.borrow().style.clone()
    }

    pub fn style_state(&self) -> StyleState {
        let state = self.shared.state.borrow();
        if !state.pending.is_empty() {
            StyleState::PendingLoad
        } else if state.style.is_some() {
            StyleState::Applied
        } else {
            StyleState::NoStyle
        }
    }

    /// Reset the layer style and every per-feature override
    pub fn clear_style(&self) {
        self.set_style(None, false);
        for feature in self.get_features(true) {
            feature.clear_style();
        }
    }

    pub fn get_legend_url(&self) -> String {
        let legend_url = self.shared.backend.legend_url();
        if legend_url.contains(LEGEND_DEFAULT) && !legend_url.contains(LEGEND_ERROR) {
            if let Some(style) = self.get_style() {
                return style.to_image();
            }
        }
        legend_url
    }

    /// Declared geometry type, else the type of the first feature
    pub fn geometry_type(&self) -> Option<GeometryType> {
        self.shared.parameters.geometry.or_else(|| {
            self.shared
                .backend
                .get_features(true, None)
                .first()
                .and_then(|f| f.geometry_type())
        })
    }

    pub fn on(&self, kind: EventKind, callback: impl Fn(&LayerEvent) + 'static) -> ListenerId {
        self.shared.events.on(kind, callback)
    }

    pub fn once(&self, kind: EventKind, callback: impl Fn(&LayerEvent) + 'static) -> ListenerId {
        self.shared.events.once(kind, callback)
    }

    pub fn un(&self, id: ListenerId) -> bool {
        self.shared.events.un(id)
    }

    fn request_style(&self, style: Option<Style>, apply_to_feature: bool, is_null_style: bool) {
        let request = StyleRequest { style, apply_to_feature, is_null_style };
        if !self.shared.backend.is_loaded() {
            self.shared.state.borrow_mut().pending.push(request);
            return;
        }
        self.apply_style(request);
    }

    fn apply_style(&self, request: StyleRequest) {
        let geometry = self.geometry_type();
        let style = request
            .style
            .unwrap_or_else(|| default_style(self.kind(), geometry));

        // clusters only make sense for points
        let eligible = !style.is_cluster() || geometry.map_or(false, |g| g.is_point());
        if eligible {
            // whatever is in place now, possibly from an earlier queued request
            let old_style = self.get_style();
            if let Some(old_style) = old_style {
                old_style.unapply(self);
            }
            style.apply(self, request.apply_to_feature, request.is_null_style);
            self.shared.state.borrow_mut().style = Some(style.clone());
            self.shared.events.fire(&LayerEvent::ChangeStyle {
                style,
                layer: self.clone(),
            });
        } else {
            console_log!("Layer {}: cluster styles need point geometries, style ignored", self.name());
        }

        if let Some(map) = self.shared.backend.map() {
            if let Some(switcher) = map.controls(LAYER_SWITCHER).into_iter().next() {
                switcher.render();
            }
        }
    }

    fn on_backend_loaded(&self, features: &[Feature]) {
        let pending = std::mem::take(&mut self.shared.state.borrow_mut().pending);
        for request in pending {
            self.apply_style(request);
        }
        self.shared.events.fire(&LayerEvent::Load(features.to_vec()));
    }
}

impl PartialEq for VectorLayer {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl fmt::Debug for VectorLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorLayer")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}

// null, blank strings, empty arrays and empty objects all mean "nothing"
fn is_null_or_empty(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parameters_from_json() {
        let params: LayerParameters = serde_json::from_value(json!({
            "name": "stops",
            "kind": "wfs",
            "geometry": "MultiPoint"
        }))
        .unwrap();
        assert_eq!(params.kind, LayerKind::Wfs);
        assert_eq!(params.geometry, Some(GeometryType::MultiPoint));
        assert!(params.url.is_none());

        let plain: LayerParameters = serde_json::from_value(json!({"name": "x"})).unwrap();
        assert_eq!(plain.kind, LayerKind::Vector);
    }

    #[test]
    fn null_or_empty_values() {
        assert!(is_null_or_empty(&json!(null)));
        assert!(is_null_or_empty(&json!("  ")));
        assert!(is_null_or_empty(&json!([])));
        assert!(is_null_or_empty(&json!({})));
        assert!(!is_null_or_empty(&json!(0)));
        assert!(!is_null_or_empty(&json!({"type": "ids", "ids": []})));
    }
}
