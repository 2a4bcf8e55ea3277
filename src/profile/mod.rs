//! Proxy Profiles

mod types;

pub use types::{BackendKind, Profile, TransportOptions};
