use wasm_bindgen::prelude::*;

// Create a console module for logging
pub mod console;
// Import our error types
pub mod error;
// Import our user-facing diagnostics
pub mod dialog;
// Import our feature model
pub mod feature;
// Import our bbox filter module
pub mod bbox_filter;
// Import our feature filters
pub mod filter;
// Import our style contract and default styles
pub mod style;
// Import our layer events
pub mod events;
// Import the backend contract and registry
pub mod backend;
// Import the in-memory backend
pub mod memory_backend;
// Import the vector layer facade
pub mod vector_layer;
// Import our geojson features module
pub mod geojson_features;
// Import our models
pub mod models;
// Import the JavaScript bindings
mod js_layer;

#[cfg(test)]
mod vector_layer_test;

pub use backend::{register_backend, unregister_backend, Control, MapHandle, VectorBackend};
pub use error::{LayerError, Result};
pub use feature::{Feature, FeatureId, GeometryType};
pub use filter::Filter;
pub use js_layer::JsVectorLayer;
pub use memory_backend::MemoryBackend;
pub use style::{Style, StyleImpl, StyleKind};
pub use vector_layer::{LayerKind, LayerOptions, LayerParameters, StyleState, VectorLayer};

// Enable better panic messages in console during development
#[cfg(feature = "console_error_panic_hook")]
pub use console_error_panic_hook::set_once as set_panic_hook;

// Use the macro from our console module
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => ($crate::console::log(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_error {
    ($($t:tt)*) => ($crate::console::error(&format!($($t)*)))
}

use std::sync::Once;
static INIT: Once = Once::new();

// This sets up the wasm_bindgen start functionality
#[wasm_bindgen(start)]
pub fn start() {
    INIT.call_once(|| {
        // Set the panic hook for better error messages
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        // Every layer kind falls back to the in-memory backend
        for kind in [LayerKind::Vector, LayerKind::GeoJson, LayerKind::Wfs] {
            register_backend(kind, MemoryBackend::create);
        }

        // Log that the module has been initialized
        console_log!("WASM module initialized successfully");
    });
}

/// Whether layers of `kind` ("vector", "geojson", "wfs") can be created
/// without handing in a backend
#[wasm_bindgen(js_name = hasBackend)]
pub fn has_backend(kind: &str) -> bool {
    serde_json::from_value::<LayerKind>(serde_json::Value::String(kind.to_string()))
        .map_or(false, backend::has_backend)
}
