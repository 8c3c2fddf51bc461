use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::feature::Feature;
use crate::style::Style;
use crate::vector_layer::VectorLayer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Load,
    ChangeStyle,
}

impl EventKind {
    /// Event name as seen from JavaScript
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Load => "load",
            EventKind::ChangeStyle => "change:style",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "load" => Some(EventKind::Load),
            "change:style" => Some(EventKind::ChangeStyle),
            _ => None,
        }
    }
}

/// Events a vector layer emits to the outside world
#[derive(Clone, Debug)]
pub enum LayerEvent {
    Load(Vec<Feature>),
    ChangeStyle { style: Style, layer: VectorLayer },
}

impl LayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LayerEvent::Load(_) => EventKind::Load,
            LayerEvent::ChangeStyle { .. } => EventKind::ChangeStyle,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Rc<dyn Fn(&LayerEvent)>;

struct Listener {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    callback: Callback,
}

/// Observer registry with synchronous dispatch.
///
/// `fire` runs every matching listener to completion, in registration
/// order, before it returns. Listeners may subscribe, unsubscribe or fire
/// again from inside a callback: the registry is not borrowed while
/// callbacks run, and only listeners present when `fire` started are called.
#[derive(Default)]
pub struct EventEmitter {
    listeners: RefCell<Vec<Listener>>,
    next_id: Cell<u64>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, kind: EventKind, callback: impl Fn(&LayerEvent) + 'static) -> ListenerId {
        self.register(kind, false, Rc::new(callback))
    }

    /// Listen for the next `kind` event only
    pub fn once(&self, kind: EventKind, callback: impl Fn(&LayerEvent) + 'static) -> ListenerId {
        self.register(kind, true, Rc::new(callback))
    }

    pub fn un(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.borrow().iter().filter(|l| l.kind == kind).count()
    }

    pub fn fire(&self, event: &LayerEvent) {
        let kind = event.kind();
        let callbacks: Vec<Callback> = {
            let mut listeners = self.listeners.borrow_mut();
            let matching = listeners
                .iter()
                .filter(|l| l.kind == kind)
                .map(|l| l.callback.clone())
                .collect();
            // one-shot listeners are gone before they run
            listeners.retain(|l| !(l.kind == kind && l.once));
            matching
        };

        for callback in callbacks {
            callback(event);
        }
    }

    fn register(&self, kind: EventKind, once: bool, callback: Callback) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push(Listener { id, kind, once, callback });
        id
    }
}
