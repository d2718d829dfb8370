// Application-layer boundaries; adapters live in `crate::infra`
pub mod ports;
