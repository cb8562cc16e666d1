use crate::{
    events::{
        requests::RequestQueue,
        types::{EventKind, MapEvent},
    },
    prelude::HashMap,
};

/// Identifies a subscription so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event listener callback type
///
/// Listeners get read-only event payloads. Anything they want done to the
/// map goes into the request queue and is executed after delivery.
pub type EventListener = Box<dyn FnMut(&MapEvent, &mut RequestQueue) + Send>;

/// Routes map events to the listeners subscribed to their kind
#[derive(Default)]
pub struct EventRouter {
    listeners: HashMap<EventKind, Vec<(ListenerId, EventListener)>>,
    next_id: u64,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event listener
    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&MapEvent, &mut RequestQueue) + Send + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Removes a listener; returns false if it was not registered
    pub fn off(&mut self, id: ListenerId) -> bool {
        for listeners in self.listeners.values_mut() {
            if let Some(index) = listeners.iter().position(|(lid, _)| *lid == id) {
                listeners.remove(index);
                return true;
            }
        }
        false
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Delivers the event to its listeners in subscription order.
    ///
    /// Returns the number of listeners invoked. Kinds nobody subscribed to
    /// are ignored.
    pub fn dispatch(&mut self, event: &MapEvent, requests: &mut RequestQueue) -> usize {
        let Some(listeners) = self.listeners.get_mut(&event.kind()) else {
            return 0;
        };
        for (_, listener) in listeners.iter_mut() {
            listener(event, requests);
        }
        listeners.len()
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<(EventKind, usize)> = EventKind::ALL
            .iter()
            .map(|kind| (*kind, self.listener_count(*kind)))
            .filter(|(_, count)| *count > 0)
            .collect();
        f.debug_struct("EventRouter")
            .field("listeners", &counts)
            .finish()
    }
}
