//! Physics events (step hooks, collisions, sleep transitions)

use crate::body::BodyId;
use crate::narrowphase::Contact;
use crossbeam_channel::{Receiver, Sender};

/// Events dispatched on the world itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    /// Fired after the solver and damping, before integration
    PreStep,
    /// Fired after time and step counter have advanced
    PostStep,
}

/// Type of a body event, used to key listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyEventType {
    Collide,
    WakeUp,
    Sleepy,
    Sleep,
}

/// Payload of a body event
#[derive(Debug, Clone, Copy)]
pub enum BodyEventKind {
    /// A new penetrating contact with another body
    Collide {
        /// The other body
        with: BodyId,
        /// The contact that started the collision
        contact: Contact,
    },
    /// The body left the sleeping state
    WakeUp,
    /// The body slowed below its sleep speed limit
    Sleepy,
    /// The body stayed slow long enough to fall asleep
    Sleep,
}

impl BodyEventKind {
    /// Listener key for this payload
    pub fn event_type(&self) -> BodyEventType {
        match self {
            Self::Collide { .. } => BodyEventType::Collide,
            Self::WakeUp => BodyEventType::WakeUp,
            Self::Sleepy => BodyEventType::Sleepy,
            Self::Sleep => BodyEventType::Sleep,
        }
    }
}

/// An event dispatched on one body
#[derive(Debug, Clone, Copy)]
pub struct BodyEvent {
    /// Body the event is dispatched on
    pub target: BodyId,
    /// What happened
    pub kind: BodyEventKind,
}

impl BodyEvent {
    /// Check if this is a collide event
    pub fn is_collide(&self) -> bool {
        matches!(self.kind, BodyEventKind::Collide { .. })
    }

    /// The other body of a collide event
    pub fn other(&self) -> Option<BodyId> {
        match self.kind {
            BodyEventKind::Collide { with, .. } => Some(with),
            _ => None,
        }
    }
}

/// Any event produced by a world step
#[derive(Debug, Clone, Copy)]
pub enum PhysicsEvent {
    World(WorldEvent),
    Body(BodyEvent),
}

/// Handler trait for physics events
pub trait PhysicsEventHandler: Send + Sync {
    /// Called for `PreStep` and `PostStep`
    fn on_world_event(&mut self, _event: WorldEvent) {}

    /// Called for every event dispatched on a body
    fn on_body_event(&mut self, _event: &BodyEvent) {}
}

/// Default event handler that collects events into a buffer
#[derive(Debug, Default)]
pub struct EventCollector {
    /// World events this step
    pub world_events: Vec<WorldEvent>,
    /// Body events this step
    pub body_events: Vec<BodyEvent>,
}

impl EventCollector {
    /// Create a new event collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all collected events
    pub fn clear(&mut self) {
        self.world_events.clear();
        self.body_events.clear();
    }

    /// Get collide events
    pub fn collisions(&self) -> impl Iterator<Item = &BodyEvent> {
        self.body_events.iter().filter(|e| e.is_collide())
    }

    /// Get collide events dispatched on one body
    pub fn collisions_of(&self, body: BodyId) -> impl Iterator<Item = &BodyEvent> {
        self.collisions().filter(move |e| e.target == body)
    }

    /// Get sleep state transitions (`WakeUp`, `Sleepy`, `Sleep`)
    pub fn sleep_transitions(&self) -> impl Iterator<Item = &BodyEvent> {
        self.body_events.iter().filter(|e| !e.is_collide())
    }
}

impl PhysicsEventHandler for EventCollector {
    fn on_world_event(&mut self, event: WorldEvent) {
        self.world_events.push(event);
    }

    fn on_body_event(&mut self, event: &BodyEvent) {
        self.body_events.push(*event);
    }
}

/// Forwards every event into a channel, for consumers on other threads
pub struct ChannelEventHandler {
    sender: Sender<PhysicsEvent>,
}

impl ChannelEventHandler {
    /// Wrap an existing sender
    pub fn new(sender: Sender<PhysicsEvent>) -> Self {
        Self { sender }
    }

    /// Create a handler together with the receiving end of an unbounded channel
    pub fn unbounded() -> (Self, Receiver<PhysicsEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self::new(sender), receiver)
    }

    fn forward(&self, event: PhysicsEvent) {
        // A dropped receiver only means nobody listens anymore
        if self.sender.send(event).is_err() {
            log::trace!("Physics event receiver disconnected");
        }
    }
}

impl PhysicsEventHandler for ChannelEventHandler {
    fn on_world_event(&mut self, event: WorldEvent) {
        self.forward(PhysicsEvent::World(event));
    }

    fn on_body_event(&mut self, event: &BodyEvent) {
        self.forward(PhysicsEvent::Body(*event));
    }
}

/// Handle returned by `add_event_listener`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u32);

/// Callback attached to a body
pub type BodyListener = Box<dyn FnMut(&BodyEvent) + Send>;

/// Per-body listener registry keyed by event type
#[derive(Default)]
pub struct EventListeners {
    next_id: u32,
    listeners: Vec<(ListenerId, BodyEventType, BodyListener)>,
}

impl EventListeners {
    /// Register a listener for one event type
    pub fn add(&mut self, event_type: BodyEventType, listener: BodyListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, event_type, listener));
        id
    }

    /// Remove a listener, returning whether it existed
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Whether any listener is registered for the type
    pub fn has(&self, event_type: BodyEventType) -> bool {
        self.listeners.iter().any(|(_, t, _)| *t == event_type)
    }

    /// Invoke every listener registered for the event's type, in registration order
    pub fn dispatch(&mut self, event: &BodyEvent) {
        let event_type = event.kind.event_type();
        for (_, t, listener) in self.listeners.iter_mut() {
            if *t == event_type {
                listener(event);
            }
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}
