//! # Domain Layer
//!
//! Instance records, routing rules and the state that holds them. No I/O;
//! tunnel control goes through [`crate::ports::TunnelDriver`].

pub mod control_plane;
pub mod errors;
pub mod instance;
pub mod profile;
pub mod route;
pub mod value_objects;

pub use control_plane::{
    ApplyReport, ControlPlane, DeleteReport, DetectedRoute, EnableReport, NewInstance,
    PurgeReport, RegistryStats, RouteSource, Transition, WorkerReport,
};
pub use errors::RegistryError;
pub use instance::{InstanceRecord, InstanceStatus};
pub use profile::{detect_vpn_type, parse_config, ConfigProfile, ParsedConfig};
pub use route::{
    RouteDraft, RoutePatch, RouteRule, RouteScope, DEFAULT_GLOBAL_GATEWAY, DEFAULT_ROUTE_PRIORITY,
};
pub use value_objects::{
    netmask_prefix_len, normalize_destination, validate_identifier, RouteProtocol, VpnType,
    MAX_IDENTIFIER_LEN,
};
