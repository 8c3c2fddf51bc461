use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::backend::{LoadListener, MapHandle, VectorBackend};
use crate::bbox_filter::Extent;
use crate::console_log;
use crate::feature::{Feature, FeatureId};
use crate::filter::Filter;
use crate::style::Style;
use crate::vector_layer::{LayerOptions, LEGEND_DEFAULT};

/// Standard backend: keeps features in memory and answers queries itself.
///
/// It counts as loaded once [`MemoryBackend::load`] has run; rendering is
/// limited to remembering the layer style and counting redraws, which is
/// what a host renderer polls.
pub struct MemoryBackend {
    features: RefCell<Vec<Feature>>,
    loaded: Cell<bool>,
    listeners: RefCell<Vec<LoadListener>>,
    style: RefCell<Option<Style>>,
    map: RefCell<Option<Rc<dyn MapHandle>>>,
    legend_url: RefCell<String>,
    redraws: Cell<usize>,
}

impl MemoryBackend {
    pub fn new(options: &LayerOptions) -> Self {
        MemoryBackend {
            features: RefCell::new(Vec::new()),
            loaded: Cell::new(false),
            listeners: RefCell::new(Vec::new()),
            style: RefCell::new(None),
            map: RefCell::new(None),
            legend_url: RefCell::new(
                options.legend_url.clone().unwrap_or_else(|| LEGEND_DEFAULT.to_string()),
            ),
            redraws: Cell::new(0),
        }
    }

    /// Factory for the backend registry
    pub fn create(options: &LayerOptions) -> Rc<dyn VectorBackend> {
        Rc::new(MemoryBackend::new(options))
    }

    /// Add `features`, mark the backend loaded and notify load listeners
    pub fn load(&self, features: &[Feature]) {
        self.add_features(features, true);
        self.loaded.set(true);

        let loaded = self.features.borrow().clone();
        let listeners: Vec<LoadListener> = self.listeners.borrow().clone();
        console_log!("Vector data loaded: {} features", loaded.len());
        for listener in listeners {
            listener(&loaded);
        }
    }

    pub fn set_map(&self, map: Option<Rc<dyn MapHandle>>) {
        *self.map.borrow_mut() = map;
    }

    pub fn set_legend_url(&self, url: &str) {
        *self.legend_url.borrow_mut() = url.to_string();
    }

    /// Layer style last handed over by a style implementation
    pub fn style(&self) -> Option<Style> {
        self.style.borrow().clone()
    }

    pub fn redraw_count(&self) -> usize {
        self.redraws.get()
    }

    pub fn len(&self) -> usize {
        self.features.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.borrow().is_empty()
    }
}

impl VectorBackend for MemoryBackend {
    fn add_features(&self, features: &[Feature], update: bool) {
        let mut stored = self.features.borrow_mut();
        for feature in features {
            match stored.iter().position(|f| f.id() == feature.id()) {
                Some(index) if update => stored[index] = feature.clone(),
                Some(_) => console_log!("Feature {} already present, skipped", feature.id()),
                None => stored.push(feature.clone()),
            }
        }
    }

    fn get_features(&self, skip_filter: bool, filter: Option<&Filter>) -> Vec<Feature> {
        let stored = self.features.borrow();
        match filter {
            Some(filter) if !skip_filter => filter.execute(&stored),
            _ => stored.clone(),
        }
    }

    fn get_feature_by_id(&self, id: &FeatureId) -> Option<Feature> {
        self.features.borrow().iter().find(|f| f.id() == id).cloned()
    }

    fn remove_features(&self, features: &[Feature]) {
        self.features
            .borrow_mut()
            .retain(|stored| !features.iter().any(|f| f.id() == stored.id()));
    }

    fn refresh(&self, force: bool) {
        // In-memory data has no source to re-read; a forced refresh re-announces it
        if force && self.loaded.get() {
            let loaded = self.features.borrow().clone();
            let listeners: Vec<LoadListener> = self.listeners.borrow().clone();
            for listener in listeners {
                listener(&loaded);
            }
        }
    }

    fn redraw(&self) {
        self.redraws.set(self.redraws.get() + 1);
    }

    fn get_features_extent(&self, skip_filter: bool, filter: Option<&Filter>) -> Option<Extent> {
        Extent::of_features(&self.get_features(skip_filter, filter))
    }

    fn legend_url(&self) -> String {
        self.legend_url.borrow().clone()
    }

    fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    fn map(&self) -> Option<Rc<dyn MapHandle>> {
        self.map.borrow().clone()
    }

    fn on_load(&self, listener: LoadListener) {
        self.listeners.borrow_mut().push(listener);
    }

    fn set_style(&self, style: Option<Style>) {
        *self.style.borrow_mut() = style;
    }
}
