//! # Method Names
//!
//! The closed set of operations a VPN control service answers to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a method name is not part of the protocol.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown method: {0}")]
pub struct UnknownMethod(pub String);

macro_rules! methods {
    ($( $(#[$doc:meta])* $variant:ident => $name:literal, mutating = $mutating:literal; )+) => {
        /// A recognized RPC method.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Method {
            $( $(#[$doc])* #[serde(rename = $name)] $variant, )+
        }

        impl Method {
            /// Every method, in declaration order.
            pub const ALL: &'static [Method] = &[ $( Method::$variant, )+ ];

            /// Wire name of the method.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Method::$variant => $name, )+
                }
            }

            /// Whether the method takes the registry write lock.
            #[must_use]
            pub const fn is_mutating(self) -> bool {
                match self {
                    $( Method::$variant => $mutating, )+
                }
            }
        }

        impl FromStr for Method {
            type Err = UnknownMethod;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $name => Ok(Method::$variant), )+
                    other => Err(UnknownMethod(other.to_string())),
                }
            }
        }
    };
}

methods! {
    /// Register a new instance.
    Add => "add", mutating = true;
    /// Remove an instance and its routes.
    Delete => "delete", mutating = true;
    /// Replace an instance's configuration.
    Update => "update", mutating = true;
    Start => "start", mutating = true;
    Stop => "stop", mutating = true;
    Restart => "restart", mutating = true;
    /// Add-if-absent, then start and mark enabled.
    Enable => "enable", mutating = true;
    /// Stop and mark disabled; the record stays.
    Disable => "disable", mutating = true;
    List => "list", mutating = false;
    Status => "status", mutating = false;
    Stats => "stats", mutating = false;
    /// Parse a configuration without registering it.
    Parse => "parse", mutating = false;
    AddCustomRoute => "add-custom-route", mutating = true;
    DeleteCustomRoute => "delete-custom-route", mutating = true;
    UpdateCustomRoute => "update-custom-route", mutating = true;
    GetCustomRoute => "get-custom-route", mutating = false;
    ListCustomRoutes => "list-custom-routes", mutating = false;
    AddInstanceRoute => "add-instance-route", mutating = true;
    DeleteInstanceRoute => "delete-instance-route", mutating = true;
    GetInstanceRoutes => "get-instance-routes", mutating = false;
    ApplyInstanceRoutes => "apply-instance-routes", mutating = true;
    /// Derive candidate routes from an instance's config; does not store them.
    DetectInstanceRoutes => "detect-instance-routes", mutating = false;
    /// Destructive wipe of every instance and route. Requires `confirm: true`.
    PurgeCleanup => "purge-cleanup", mutating = true;
    ThreadStatus => "thread_status", mutating = false;
    ThreadOperation => "thread_operation", mutating = true;
    RuntimeInfo => "runtime-info", mutating = false;
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
