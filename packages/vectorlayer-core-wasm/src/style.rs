use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::feature::GeometryType;
use crate::vector_layer::{LayerKind, VectorLayer, WeakVectorLayer};

/// Styling engine behind a [`Style`] handle.
///
/// The layer only ever drives a style through this trait; clustering,
/// symbol rendering and the like live in the implementation.
pub trait StyleImpl {
    /// Attach the style to `layer`. With `apply_to_feature` every current
    /// feature receives the style as its own override. `is_null_style` marks
    /// a default that stands in for an explicit "no style" request.
    fn apply(&self, style: &Style, layer: &VectorLayer, apply_to_feature: bool, is_null_style: bool);

    fn unapply(&self, style: &Style, layer: &VectorLayer);

    /// Re-render `layer`, or every layer the style is attached to when `None`
    fn refresh(&self, style: &Style, layer: Option<&VectorLayer>);

    /// Legend image for the style, usually a data URL
    fn to_image(&self, style: &Style) -> String;

    fn activate_change_event(&self) {}

    fn deactivate_change_event(&self) {}

    /// JSON description of the style, if it has one
    fn options(&self) -> Option<serde_json::Value> {
        None
    }
}

#[derive(Clone)]
pub enum StyleKind {
    Simple,
    /// Groups nearby points; `old_style` renders unclustered features
    Cluster { old_style: Option<Box<Style>> },
}

/// Shared handle to a style. Clones refer to the same style instance.
#[derive(Clone)]
pub struct Style {
    kind: StyleKind,
    imp: Rc<dyn StyleImpl>,
}

impl Style {
    pub fn new(imp: Rc<dyn StyleImpl>) -> Self {
        Style { kind: StyleKind::Simple, imp }
    }

    pub fn cluster(imp: Rc<dyn StyleImpl>, old_style: Option<Style>) -> Self {
        Style {
            kind: StyleKind::Cluster { old_style: old_style.map(Box::new) },
            imp,
        }
    }

    /// Built-in style rendering `options` for features of the given geometry family
    pub fn from_options(options: StyleOptions, geometry: Option<GeometryType>) -> Self {
        Style::new(Rc::new(GeometryStyle::new(options, geometry)))
    }

    pub fn kind(&self) -> &StyleKind {
        &self.kind
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self.kind, StyleKind::Cluster { .. })
    }

    /// Wrapped style of a cluster, `None` for simple styles
    pub fn old_style(&self) -> Option<&Style> {
        match &self.kind {
            StyleKind::Cluster { old_style } => old_style.as_deref(),
            StyleKind::Simple => None,
        }
    }

    pub fn get_impl(&self) -> &dyn StyleImpl {
        self.imp.as_ref()
    }

    pub fn apply(&self, layer: &VectorLayer, apply_to_feature: bool, is_null_style: bool) {
        self.imp.apply(self, layer, apply_to_feature, is_null_style);
    }

    pub fn unapply(&self, layer: &VectorLayer) {
        self.imp.unapply(self, layer);
    }

    pub fn refresh(&self, layer: Option<&VectorLayer>) {
        self.imp.refresh(self, layer);
    }

    pub fn to_image(&self) -> String {
        self.imp.to_image(self)
    }

    pub fn options(&self) -> Option<serde_json::Value> {
        self.imp.options()
    }

    /// Same underlying style instance
    pub fn ptr_eq(&self, other: &Style) -> bool {
        Rc::as_ptr(&self.imp).cast::<()>() == Rc::as_ptr(&other.imp).cast::<()>()
    }
}

impl PartialEq for Style {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StyleKind::Simple => f.write_str("Style::Simple"),
            StyleKind::Cluster { old_style } => f
                .debug_struct("Style::Cluster")
                .field("old_style", old_style)
                .finish(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FillOptions {
    pub color: String,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokeOptions {
    pub color: String,
    #[serde(default = "default_stroke_width")]
    pub width: f64,
}

fn default_opacity() -> f64 {
    1.0
}

fn default_stroke_width() -> f64 {
    1.0
}

/// Options of the built-in geometry style
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<FillOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<StrokeOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

impl StyleOptions {
    fn new(fill: Option<(&str, f64)>, stroke: Option<(&str, f64)>, radius: Option<f64>) -> Self {
        StyleOptions {
            fill: fill.map(|(color, opacity)| FillOptions { color: color.to_string(), opacity }),
            stroke: stroke.map(|(color, width)| StrokeOptions { color: color.to_string(), width }),
            radius,
        }
    }

    /// Defaults of GeoJSON and plain vector layers
    pub fn geojson_defaults(geometry: Option<GeometryType>) -> Self {
        match geometry {
            Some(g) if g.is_point() => StyleOptions::new(Some(("#00AAFF", 1.0)), Some(("#FFFFFF", 2.0)), Some(6.0)),
            Some(g) if g.is_line() => StyleOptions::new(None, Some(("#00AAFF", 3.0)), None),
            Some(g) if g.is_polygon() => StyleOptions::new(Some(("#00AAFF", 0.3)), Some(("#0077BB", 2.0)), None),
            _ => StyleOptions::new(Some(("#00AAFF", 0.4)), Some(("#0077BB", 1.5)), Some(5.0)),
        }
    }

    /// Defaults of WFS layers
    pub fn wfs_defaults(geometry: Option<GeometryType>) -> Self {
        match geometry {
            Some(g) if g.is_point() => StyleOptions::new(Some(("#71A7D3", 1.0)), Some(("#FFFFFF", 2.0)), Some(7.0)),
            Some(g) if g.is_line() => StyleOptions::new(None, Some(("#C8102E", 3.0)), None),
            Some(g) if g.is_polygon() => StyleOptions::new(Some(("#71A7D3", 0.6)), Some(("#FFFFFF", 1.0)), None),
            _ => StyleOptions::new(Some(("#71A7D3", 0.6)), Some(("#FFFFFF", 1.5)), Some(7.0)),
        }
    }
}

/// Default style of a layer variant, keyed by kind and geometry family
pub fn default_style(kind: LayerKind, geometry: Option<GeometryType>) -> Style {
    let options = match kind {
        LayerKind::Wfs => StyleOptions::wfs_defaults(geometry),
        LayerKind::Vector | LayerKind::GeoJson => StyleOptions::geojson_defaults(geometry),
    };
    Style::from_options(options, geometry)
}

/// Built-in style: hands itself to the backend as the layer style and
/// keeps track of the layers it is attached to for `refresh`.
pub struct GeometryStyle {
    options: StyleOptions,
    // unknown until the first layer it is applied to has features
    geometry: Cell<Option<GeometryType>>,
    // (layer, applied as a null-style stand-in)
    layers: RefCell<Vec<(WeakVectorLayer, bool)>>,
}

impl GeometryStyle {
    pub fn new(options: StyleOptions, geometry: Option<GeometryType>) -> Self {
        GeometryStyle {
            options,
            geometry: Cell::new(geometry),
            layers: RefCell::new(Vec::new()),
        }
    }

    pub fn style_options(&self) -> &StyleOptions {
        &self.options
    }

    fn attached_layers(&self) -> Vec<(VectorLayer, bool)> {
        self.layers
            .borrow()
            .iter()
            .filter_map(|(weak, is_null)| weak.upgrade().map(|layer| (layer, *is_null)))
            .collect()
    }

    fn render_on(style: &Style, layer: &VectorLayer, is_null_style: bool) {
        let rendered = if is_null_style { None } else { Some(style.clone()) };
        layer.backend().set_style(rendered);
    }

    fn svg(&self) -> String {
        let fill = self
            .options
            .fill
            .as_ref()
            .map(|f| format!("fill=\"{}\" fill-opacity=\"{}\"", f.color, f.opacity))
            .unwrap_or_else(|| "fill=\"none\"".to_string());
        let stroke = self
            .options
            .stroke
            .as_ref()
            .map(|s| format!("stroke=\"{}\" stroke-width=\"{}\"", s.color, s.width))
            .unwrap_or_default();
        let stroke_width = self.options.stroke.as_ref().map_or(0.0, |s| s.width);

        let (size, shape) = match self.geometry.get() {
            Some(g) if g.is_line() => (
                24.0,
                format!("<polyline points=\"2,20 10,8 16,16 22,4\" fill=\"none\" {}/>", stroke),
            ),
            Some(g) if g.is_polygon() => (
                24.0,
                format!("<rect x=\"3\" y=\"3\" width=\"18\" height=\"18\" {} {}/>", fill, stroke),
            ),
            _ => {
                let r = self.options.radius.unwrap_or(5.0);
                let size = 2.0 * (r + stroke_width);
                (
                    size,
                    format!("<circle cx=\"{c}\" cy=\"{c}\" r=\"{r}\" {} {}/>", fill, stroke, c = size / 2.0, r = r),
                )
            }
        };

        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{s}\" height=\"{s}\">{}</svg>",
            shape,
            s = size
        )
    }
}

impl StyleImpl for GeometryStyle {
    fn apply(&self, style: &Style, layer: &VectorLayer, apply_to_feature: bool, is_null_style: bool) {
        if self.geometry.get().is_none() {
            self.geometry.set(layer.geometry_type());
        }
        if apply_to_feature {
            for feature in layer.get_features(true) {
                feature.set_style(Some(style.clone()));
            }
        }
        GeometryStyle::render_on(style, layer, is_null_style);

        let mut layers = self.layers.borrow_mut();
        layers.retain(|(weak, _)| weak.upgrade().is_some() && !weak.points_to(layer));
        layers.push((layer.downgrade(), is_null_style));
    }

    fn unapply(&self, style: &Style, layer: &VectorLayer) {
        for feature in layer.get_features(true) {
            if feature.style().map_or(false, |s| s.ptr_eq(style)) {
                feature.clear_style();
            }
        }
        layer.backend().set_style(None);
        self.layers.borrow_mut().retain(|(weak, _)| !weak.points_to(layer));
    }

    fn refresh(&self, style: &Style, layer: Option<&VectorLayer>) {
        let attached = self.attached_layers();
        match layer {
            Some(layer) => {
                let is_null = attached
                    .iter()
                    .find(|(l, _)| l.ptr_eq(layer))
                    .map_or(false, |(_, is_null)| *is_null);
                GeometryStyle::render_on(style, layer, is_null);
            }
            None => {
                for (layer, is_null) in attached {
                    GeometryStyle::render_on(style, &layer, is_null);
                }
            }
        }
    }

    fn to_image(&self, _style: &Style) -> String {
        format!("data:image/svg+xml;charset=utf-8,{}", encode_data_url(&self.svg()))
    }

    fn options(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.options).ok()
    }
}

// Percent-encode the characters that break an inline SVG data URL
fn encode_data_url(svg: &str) -> String {
    let mut out = String::with_capacity(svg.len() + svg.len() / 4);
    for c in svg.chars() {
        match c {
            '%' => out.push_str("%25"),
            '#' => out.push_str("%23"),
            '<' => out.push_str("%3C"),
            '>' => out.push_str("%3E"),
            '"' => out.push('\''),
            _ => out.push(c),
        }
    }
    out
}
