//! Core types and seams shared by the probe, scanner and store crates.

mod host;
mod probe;
mod store;
mod types;

pub use host::{clean_host, validate_domain, InvalidDomain};
pub use probe::{HostProbe, ProbeError};
pub use store::DomainStore;
pub use types::*;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }
}
