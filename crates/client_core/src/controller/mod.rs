//! Controller layer: session events, the state transition function, and the
//! coordinator task that serializes every transition.

pub mod events;
pub mod orchestration;
pub mod params;
pub mod reducer;

pub use events::{OperationKind, SessionEvent};
pub use orchestration::{OperationTicket, SessionBeacon, SessionController};
pub use params::derive_generate_options;
pub use reducer::{reduce, Transition};
