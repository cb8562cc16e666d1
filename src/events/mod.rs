pub mod requests;
pub mod router;
pub mod types;

pub use requests::{MapRequest, MoveZoom, RequestQueue};
pub use router::{EventListener, EventRouter, ListenerId};
pub use types::{EventKind, MapEvent};
