//! # VPN Control Plane Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # broker + service + client fixture
//! └── integration/      # caller → broker → dispatcher → caller
//!     ├── rpc_flows.rs
//!     ├── resilience.rs
//!     └── persistence.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p vc-tests
//! cargo test -p vc-tests integration::resilience::
//! cargo bench -p vc-tests
//! ```

pub mod harness;
pub mod integration;
