pub mod host;
pub mod rig;

pub use host::{EntitySnapshot, HostCall, InMemoryHost, StubFieldType};
pub use rig::{TestRig, init_tracing};
