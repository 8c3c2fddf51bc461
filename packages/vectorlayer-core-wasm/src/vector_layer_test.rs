#[cfg(test)]
mod tests {
    use geo_types::{line_string, point, polygon, Geometry};
    use serde_json::json;
    use std::any::Any;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::backend::{self, Control, MapHandle, VectorBackend};
    use crate::dialog::Dialog;
    use crate::error::LayerError;
    use crate::events::{EventKind, LayerEvent};
    use crate::feature::{Feature, FeatureId, GeometryType};
    use crate::filter::Filter;
    use crate::memory_backend::MemoryBackend;
    use crate::style::{Style, StyleImpl, StyleOptions};
    use crate::vector_layer::{
        LayerKind, LayerOptions, LayerParameters, StyleState, VectorLayer, LAYER_SWITCHER, LEGEND_DEFAULT,
    };

    type CallLog = Rc<RefCell<Vec<String>>>;

    // Style engine double that only records what the layer asks of it
    struct RecordingStyle {
        label: &'static str,
        calls: CallLog,
    }

    impl RecordingStyle {
        fn record(&self, call: &str) {
            let entry = if self.label.is_empty() {
                call.to_string()
            } else {
                format!("{} {}", self.label, call)
            };
            self.calls.borrow_mut().push(entry);
        }
    }

    impl StyleImpl for RecordingStyle {
        fn apply(&self, _style: &Style, _layer: &VectorLayer, _apply_to_feature: bool, is_null_style: bool) {
            self.record(if is_null_style { "apply(null)" } else { "apply" });
        }

        fn unapply(&self, _style: &Style, _layer: &VectorLayer) {
            self.record("unapply");
        }

        fn refresh(&self, _style: &Style, layer: Option<&VectorLayer>) {
            self.record(if layer.is_some() { "refresh(layer)" } else { "refresh" });
        }

        fn to_image(&self, _style: &Style) -> String {
            "recorded.png".to_string()
        }

        fn activate_change_event(&self) {
            self.record("activate");
        }

        fn deactivate_change_event(&self) {
            self.record("deactivate");
        }
    }

    fn recording_style(calls: &CallLog) -> Style {
        labelled_style(calls, "")
    }

    fn labelled_style(calls: &CallLog, label: &'static str) -> Style {
        Style::new(Rc::new(RecordingStyle { label, calls: calls.clone() }))
    }

    fn recording_cluster(calls: &CallLog, old_style: Option<Style>) -> Style {
        Style::cluster(Rc::new(RecordingStyle { label: "", calls: calls.clone() }), old_style)
    }

    fn calls() -> CallLog {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[derive(Default)]
    struct RecordingDialog {
        errors: RefCell<Vec<String>>,
    }

    impl Dialog for RecordingDialog {
        fn error(&self, message: &str) {
            self.errors.borrow_mut().push(message.to_string());
        }
    }

    struct Switcher {
        renders: Cell<usize>,
    }

    impl Control for Switcher {
        fn name(&self) -> &str {
            LAYER_SWITCHER
        }

        fn render(&self) {
            self.renders.set(self.renders.get() + 1);
        }
    }

    struct TestMap {
        switcher: Rc<Switcher>,
    }

    impl MapHandle for TestMap {
        fn controls(&self, name: &str) -> Vec<Rc<dyn Control>> {
            if name == LAYER_SWITCHER {
                vec![self.switcher.clone() as Rc<dyn Control>]
            } else {
                Vec::new()
            }
        }
    }

    fn pt(id: &str, x: f64, y: f64) -> Feature {
        Feature::new(id, Some(Geometry::Point(point!(x: x, y: y))))
    }

    fn road(id: &str) -> Feature {
        Feature::new(id, Some(Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 5.0, y: 5.0)])))
    }

    fn memory_layer(name: &str, options: LayerOptions) -> (VectorLayer, Rc<MemoryBackend>) {
        let backend = Rc::new(MemoryBackend::new(&options));
        let layer = VectorLayer::new(
            LayerParameters::named(name),
            options,
            Some(backend.clone() as Rc<dyn VectorBackend>),
        )
        .unwrap();
        (layer, backend)
    }

    fn layer_with_dialog(name: &str) -> (VectorLayer, Rc<MemoryBackend>, Rc<RecordingDialog>) {
        let dialog = Rc::new(RecordingDialog::default());
        let options = LayerOptions {
            dialog: Some(dialog.clone() as Rc<dyn Dialog>),
            ..Default::default()
        };
        let (layer, backend) = memory_layer(name, options);
        (layer, backend, dialog)
    }

    #[test]
    fn style_requested_before_load_waits_for_it() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        let log = calls();
        let style = recording_style(&log);

        layer.set_style(Some(style.clone()), false);
        assert_eq!(layer.style_state(), StyleState::PendingLoad);
        assert!(layer.get_style().is_none());
        assert!(log.borrow().is_empty());

        backend.load(&[pt("a", 0.0, 0.0)]);
        assert_eq!(*log.borrow(), vec!["apply"]);
        assert!(layer.get_style().map_or(false, |s| s.ptr_eq(&style)));
        assert_eq!(layer.style_state(), StyleState::Applied);

        // pending requests are one-shot
        backend.load(&[pt("b", 1.0, 1.0)]);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn every_pending_request_runs_in_order() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        let log = calls();
        let changes = Rc::new(Cell::new(0));
        let c = changes.clone();
        layer.on(EventKind::ChangeStyle, move |_| c.set(c.get() + 1));

        let second = labelled_style(&log, "B");
        layer.set_style(Some(labelled_style(&log, "A")), false);
        layer.set_style(Some(second.clone()), false);
        assert_eq!(layer.style_state(), StyleState::PendingLoad);

        backend.load(&[pt("a", 0.0, 0.0)]);
        assert_eq!(*log.borrow(), vec!["A apply", "A unapply", "B apply"]);
        // the initial default, then A, then B
        assert_eq!(changes.get(), 3);
        assert!(layer.get_style().map_or(false, |s| s.ptr_eq(&second)));
        assert_eq!(layer.style_state(), StyleState::Applied);

        backend.load(&[]);
        assert_eq!(log.borrow().len(), 3);
        assert_eq!(changes.get(), 3);
    }

    #[test]
    fn style_applies_at_once_when_loaded() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        backend.load(&[pt("a", 0.0, 0.0)]);

        let (first_log, second_log) = (calls(), calls());
        layer.set_style(Some(recording_style(&first_log)), false);
        assert_eq!(*first_log.borrow(), vec!["apply"]);

        layer.set_style(Some(recording_style(&second_log)), false);
        assert_eq!(*first_log.borrow(), vec!["apply", "unapply"]);
        assert_eq!(*second_log.borrow(), vec!["apply"]);
    }

    #[test]
    fn missing_style_falls_back_to_the_kind_default() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        backend.load(&[pt("a", 0.0, 0.0)]);

        let style = layer.get_style().unwrap();
        let expected = serde_json::to_value(StyleOptions::geojson_defaults(Some(GeometryType::Point))).unwrap();
        assert_eq!(style.options(), Some(expected));
        assert!(backend.style().map_or(false, |s| s.ptr_eq(&style)));

        // explicit "no style": a default is still recorded but the engine default renders
        layer.set_style(None, false);
        assert!(layer.get_style().is_some());
        assert!(backend.style().is_none());
    }

    #[test]
    fn wfs_layers_get_wfs_defaults() {
        let backend = Rc::new(MemoryBackend::new(&LayerOptions::default()));
        let params = LayerParameters {
            kind: LayerKind::Wfs,
            geometry: Some(GeometryType::MultiPoint),
            ..LayerParameters::named("wfs")
        };
        let layer = VectorLayer::new(params, LayerOptions::default(), Some(backend.clone() as Rc<dyn VectorBackend>)).unwrap();
        backend.load(&[]);

        let expected = serde_json::to_value(StyleOptions::wfs_defaults(Some(GeometryType::MultiPoint))).unwrap();
        assert_eq!(layer.get_style().and_then(|s| s.options()), Some(expected));
    }

    #[test]
    fn change_style_and_load_events() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        let order = calls();

        let o = order.clone();
        layer.on(EventKind::ChangeStyle, move |event| {
            if let LayerEvent::ChangeStyle { layer, .. } = event {
                o.borrow_mut().push(format!("change:style {}", layer.name()));
            }
        });
        let o = order.clone();
        layer.once(EventKind::Load, move |event| {
            if let LayerEvent::Load(features) = event {
                o.borrow_mut().push(format!("load {}", features.len()));
            }
        });

        backend.load(&[pt("a", 0.0, 0.0), pt("b", 1.0, 1.0)]);
        backend.load(&[]);
        assert_eq!(*order.borrow(), vec!["change:style stops", "load 2"]);
    }

    #[test]
    fn filter_narrows_features_until_removed() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        backend.load(&[pt("a", 0.0, 0.0), pt("b", 4.0, 4.0)]);

        layer.set_filter(Some(Filter::Ids { ids: vec!["a".into()] }));
        assert!(layer.has_filter());
        assert_eq!(layer.get_features(false).len(), 1);
        assert_eq!(layer.get_features(true).len(), 2);
        assert_eq!(layer.get_features_extent(false).map(<[f64; 4]>::from), Some([0.0, 0.0, 0.0, 0.0]));

        layer.remove_filter();
        assert!(layer.get_filter().is_none());
        assert_eq!(layer.get_features(false).len(), 2);
    }

    #[test]
    fn set_filter_redraws() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        backend.load(&[pt("a", 0.0, 0.0)]);
        let before = backend.redraw_count();

        layer.set_filter(Some(Filter::function(|f| f.id() == &FeatureId::from("a"))));
        assert_eq!(backend.redraw_count(), before + 1);
    }

    #[test]
    fn refresh_reloads_then_redraws() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        backend.load(&[pt("a", 0.0, 0.0)]);
        let log = calls();
        layer.set_style(Some(recording_style(&log)), false);
        log.borrow_mut().clear();

        let loads = Rc::new(Cell::new(0));
        let l = loads.clone();
        layer.on(EventKind::Load, move |_| l.set(l.get() + 1));
        let before = backend.redraw_count();

        layer.refresh();
        assert_eq!(loads.get(), 1);
        assert_eq!(backend.redraw_count(), before + 1);
        assert_eq!(*log.borrow(), vec!["refresh"]);
    }

    #[test]
    fn redraw_refreshes_a_simple_style() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        backend.load(&[pt("a", 0.0, 0.0)]);
        let log = calls();
        layer.set_style(Some(recording_style(&log)), false);
        log.borrow_mut().clear();
        let before = backend.redraw_count();

        layer.redraw();
        assert_eq!(backend.redraw_count(), before + 1);
        assert_eq!(*log.borrow(), vec!["refresh"]);
    }

    #[test]
    fn redraw_of_bare_cluster_refreshes_nothing() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        backend.load(&[pt("a", 0.0, 0.0)]);
        let log = calls();
        layer.set_style(Some(recording_cluster(&log, None)), false);
        log.borrow_mut().clear();
        let before = backend.redraw_count();

        layer.redraw();
        assert_eq!(backend.redraw_count(), before + 1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn remove_filter_matches_set_filter_none() {
        let only_a = || Filter::Ids { ids: vec!["a".into()] };
        let (removed, removed_backend) = memory_layer("stops", LayerOptions::default());
        let (unset, unset_backend) = memory_layer("stops", LayerOptions::default());
        for backend in [&removed_backend, &unset_backend] {
            backend.load(&[pt("a", 0.0, 0.0), pt("b", 4.0, 4.0)]);
        }
        removed.set_filter(Some(only_a()));
        unset.set_filter(Some(only_a()));

        removed.remove_filter();
        unset.set_filter(None);

        assert_eq!(removed.has_filter(), unset.has_filter());
        assert_eq!(removed.get_features(false).len(), unset.get_features(false).len());
        assert_eq!(removed.get_features_extent(false), unset.get_features_extent(false));
        assert_eq!(removed_backend.redraw_count(), unset_backend.redraw_count());
    }

    #[test]
    fn style_without_geometry_picks_it_up_on_apply() {
        let (layer, backend) = memory_layer("parcels", LayerOptions::default());
        let square = Feature::new(
            "p1",
            Some(Geometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)])),
        );

        layer.set_style(Some(Style::from_options(StyleOptions::default(), layer.geometry_type())), false);
        backend.load(&[square]);
        assert!(layer.get_legend_url().contains("%3Crect"));
    }

    #[test]
    fn clear_drops_filter_and_features() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        backend.load(&[pt("a", 0.0, 0.0), pt("b", 1.0, 1.0), pt("c", 2.0, 2.0)]);
        layer.set_filter(Some(Filter::Ids { ids: vec!["a".into()] }));

        layer.clear();
        assert!(!layer.has_filter());
        assert!(backend.is_empty());
        assert!(layer.get_features(true).is_empty());
    }

    #[test]
    fn empty_feature_list_is_ignored() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        layer.add_features(&[], false);
        layer.add_feature(pt("a", 0.0, 0.0), false);
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn type_cannot_change() {
        let (layer, _) = memory_layer("stops", LayerOptions::default());
        assert_eq!(layer.layer_type(), "Vector");
        assert!(layer.set_type(None).is_ok());
        assert!(layer.set_type(Some("")).is_ok());
        assert!(layer.set_type(Some("Vector")).is_ok());
        assert!(matches!(layer.set_type(Some("WMS")), Err(LayerError::TypeMismatch { .. })));
        assert_eq!(layer.layer_type(), "Vector");
    }

    #[test]
    fn cluster_filter_refreshes_once() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        backend.load(&[pt("a", 0.0, 0.0), pt("b", 1.0, 1.0)]);

        let (cluster_log, inner_log) = (calls(), calls());
        let cluster = recording_cluster(&cluster_log, Some(recording_style(&inner_log)));
        layer.set_style(Some(cluster), false);
        assert_eq!(*cluster_log.borrow(), vec!["apply"]);
        cluster_log.borrow_mut().clear();

        layer.set_filter(Some(Filter::Ids { ids: vec!["a".into()] }));
        assert_eq!(*cluster_log.borrow(), vec!["deactivate", "activate", "refresh"]);
        // the wrapped style re-renders the layer during the redraw
        assert_eq!(*inner_log.borrow(), vec!["refresh(layer)"]);
    }

    #[test]
    fn cluster_needs_point_geometries() {
        let (layer, backend) = memory_layer("roads", LayerOptions::default());
        backend.load(&[road("r1")]);
        let default = layer.get_style().unwrap();

        let cluster_log = calls();
        layer.set_style(Some(recording_cluster(&cluster_log, Some(default.clone()))), false);
        assert!(cluster_log.borrow().is_empty());
        assert!(layer.get_style().map_or(false, |s| s.ptr_eq(&default)));
    }

    #[test]
    fn style_changes_render_the_layer_switcher() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        let switcher = Rc::new(Switcher { renders: Cell::new(0) });
        backend.set_map(Some(Rc::new(TestMap { switcher: switcher.clone() })));

        backend.load(&[pt("a", 0.0, 0.0)]);
        assert_eq!(switcher.renders.get(), 1);

        layer.set_style(Some(recording_style(&calls())), false);
        assert_eq!(switcher.renders.get(), 2);
    }

    #[test]
    fn styles_can_be_pushed_to_features_and_cleared() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        backend.load(&[pt("a", 0.0, 0.0), pt("b", 1.0, 1.0)]);
        layer.set_filter(Some(Filter::Ids { ids: vec!["a".into()] }));

        let style = Style::from_options(StyleOptions::default(), Some(GeometryType::Point));
        layer.set_style(Some(style.clone()), true);
        assert!(layer.get_features(true).iter().all(|f| f.style().map_or(false, |s| s.ptr_eq(&style))));

        layer.clear_style();
        assert!(layer.get_features(true).iter().all(|f| f.style().is_none()));
    }

    #[test]
    fn legend_url_prefers_style_image_over_placeholder() {
        let (layer, backend) = memory_layer("stops", LayerOptions::default());
        assert_eq!(layer.get_legend_url(), LEGEND_DEFAULT);

        backend.load(&[pt("a", 0.0, 0.0)]);
        assert!(layer.get_legend_url().starts_with("data:image/svg+xml"));

        let options = LayerOptions {
            legend_url: Some("https://example.org/legend.png".to_string()),
            ..Default::default()
        };
        let (custom, custom_backend) = memory_layer("custom", options);
        custom_backend.load(&[pt("a", 0.0, 0.0)]);
        assert_eq!(custom.get_legend_url(), "https://example.org/legend.png");
    }

    #[test]
    fn invalid_filter_value_is_reported() {
        let (layer, backend, dialog) = layer_with_dialog("stops");
        backend.load(&[pt("a", 0.0, 0.0)]);

        layer.set_filter_value(&json!({"type": "ids", "ids": ["a"]}));
        assert!(layer.has_filter());

        layer.set_filter_value(&json!({"type": "nearest"}));
        assert_eq!(*dialog.errors.borrow(), vec!["The specified filter is not valid"]);
        assert!(layer.has_filter());

        layer.set_filter_value(&json!(null));
        assert!(!layer.has_filter());
    }

    #[test]
    fn lookup_without_id_is_reported() {
        let (layer, backend, dialog) = layer_with_dialog("stops");
        backend.load(&[pt("a", 0.0, 0.0)]);

        assert!(layer.get_feature_by_id(&FeatureId::from("")).is_none());
        assert_eq!(dialog.errors.borrow().len(), 1);

        assert!(layer.get_feature_by_id(&FeatureId::from("a")).is_some());
        assert!(layer.get_feature_by_id(&FeatureId::from("zz")).is_none());
        assert_eq!(dialog.errors.borrow().len(), 1);
    }

    #[test]
    fn equality_is_by_name() {
        let (a, _) = memory_layer("stops", LayerOptions::default());
        let (b, _) = memory_layer("stops", LayerOptions::default());
        let (c, _) = memory_layer("roads", LayerOptions::default());

        assert!(a.equals(&b as &dyn Any));
        assert!(!a.equals(&c as &dyn Any));
        assert!(!a.equals(&"stops" as &dyn Any));
        assert!(!a.ptr_eq(&b));
    }

    // The only test touching the global registry
    #[test]
    fn layers_without_backend_use_the_registry() {
        let params = LayerParameters {
            kind: LayerKind::Wfs,
            ..LayerParameters::named("registered")
        };
        let missing = VectorLayer::new(params.clone(), LayerOptions::default(), None);
        assert!(matches!(missing, Err(LayerError::BackendUnavailable)));

        backend::register_backend(LayerKind::Wfs, MemoryBackend::create);
        let layer = VectorLayer::new(params, LayerOptions::default(), None).unwrap();
        assert!(!layer.backend().is_loaded());
        assert!(backend::unregister_backend(LayerKind::Wfs).is_some());
    }
}
