use thiserror::Error;
use wasm_bindgen::JsValue;

/// Hard failures of the vector layer facade.
///
/// Misuse that the UI can recover from (a bad filter value, a missing
/// feature id) is not an error: it is reported through the layer's
/// [`Dialog`](crate::dialog::Dialog) and the operation degrades to a no-op.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("the active implementation cannot create Vector layers")]
    BackendUnavailable,

    #[error("layer type must be '{expected}' but '{found}' was specified")]
    TypeMismatch { expected: String, found: String },

    #[error("invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<LayerError> for JsValue {
    fn from(err: LayerError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LayerError>;
