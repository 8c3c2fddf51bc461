// This is the models module containing shared data structures
use serde::{Deserialize, Serialize};

use crate::vector_layer::{StyleState, VectorLayer};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayerSummary {
    pub name: String,
    pub layer_type: String,
    pub feature_count: usize,
    pub visible_feature_count: usize,
    pub has_filter: bool,
    pub style_state: String,
    pub loaded: bool,
}

impl LayerSummary {
    pub fn of(layer: &VectorLayer) -> Self {
        let style_state = match layer.style_state() {
            StyleState::NoStyle => "none",
            StyleState::PendingLoad => "pending",
            StyleState::Applied => "applied",
        };
        LayerSummary {
            name: layer.name().to_string(),
            layer_type: layer.layer_type().to_string(),
            feature_count: layer.get_features(true).len(),
            visible_feature_count: layer.get_features(false).len(),
            has_filter: layer.has_filter(),
            style_state: style_state.to_string(),
            loaded: layer.backend().is_loaded(),
        }
    }
}
