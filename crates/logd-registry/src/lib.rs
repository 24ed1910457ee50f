//! The subscriber registry: a table of live tailers mutated by a single
//! service-loop task, with fan-out delivery, predicate filtering, and
//! ping/kick liveness management.

mod registry;
mod subscriber;

pub use registry::{spawn, DatagramSink, LivenessConfig, NewTail, RegistryHandle};
pub use subscriber::{should_send, Subscriber};
