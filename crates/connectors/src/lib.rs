//! Provider connector implementations for the fedstat engine.
pub mod sources;

pub use sources::{
    default_registry, Connector, ConnectorError, ConnectorErrorKind, ConnectorFactory,
    ConnectorRegistry, HealthStatus,
};
