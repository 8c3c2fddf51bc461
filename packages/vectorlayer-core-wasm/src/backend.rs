use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::rc::Rc;

use crate::bbox_filter::Extent;
use crate::feature::{Feature, FeatureId};
use crate::filter::Filter;
use crate::style::Style;
use crate::vector_layer::{LayerKind, LayerOptions};

/// Called with the loaded features whenever the backend finishes loading
pub type LoadListener = Rc<dyn Fn(&[Feature])>;

/// Rendering/storage engine a [`VectorLayer`](crate::vector_layer::VectorLayer) delegates to.
///
/// Methods take `&self`: backends are shared, single-threaded objects and
/// keep their mutable state behind cells. Load listeners must be invoked
/// after the backend has released its internal borrows, since a listener
/// typically calls straight back into the backend.
pub trait VectorBackend {
    /// Insert features, or merge them into existing ones when `update` is set
    fn add_features(&self, features: &[Feature], update: bool);

    fn get_features(&self, skip_filter: bool, filter: Option<&Filter>) -> Vec<Feature>;

    fn get_feature_by_id(&self, id: &FeatureId) -> Option<Feature>;

    fn remove_features(&self, features: &[Feature]);

    /// Reload the data, from the source when `force` is set
    fn refresh(&self, force: bool);

    fn redraw(&self);

    fn get_features_extent(&self, skip_filter: bool, filter: Option<&Filter>) -> Option<Extent>;

    fn legend_url(&self) -> String;

    fn is_loaded(&self) -> bool;

    /// Map the layer is attached to, if any
    fn map(&self) -> Option<Rc<dyn MapHandle>>;

    fn on_load(&self, listener: LoadListener);

    /// Layer-wide rendering style, `None` restores the engine default
    fn set_style(&self, style: Option<Style>);
}

/// The part of a map the layer facade talks to
pub trait MapHandle {
    /// Controls registered under `name`, in insertion order
    fn controls(&self, name: &str) -> Vec<Rc<dyn Control>>;
}

pub trait Control {
    fn name(&self) -> &str;

    fn render(&self) {}
}

/// Builds the standard backend for a layer kind
pub type BackendFactory = fn(&LayerOptions) -> Rc<dyn VectorBackend>;

lazy_static! {
    static ref BACKEND_FACTORIES: Mutex<HashMap<LayerKind, BackendFactory>> = Mutex::new(HashMap::new());
}

// Register the factory used when a layer is created without an explicit backend
pub fn register_backend(kind: LayerKind, factory: BackendFactory) {
    BACKEND_FACTORIES.lock().insert(kind, factory);
}

pub fn unregister_backend(kind: LayerKind) -> Option<BackendFactory> {
    BACKEND_FACTORIES.lock().remove(&kind)
}

pub fn backend_factory(kind: LayerKind) -> Option<BackendFactory> {
    BACKEND_FACTORIES.lock().get(&kind).copied()
}

pub fn has_backend(kind: LayerKind) -> bool {
    BACKEND_FACTORIES.lock().contains_key(&kind)
}
