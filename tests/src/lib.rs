//! # DNS Stream Analyzer Test Suite
//!
//! Scenarios that need more than one crate.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs       # In-process pipeline + mock ports
//!     ├── properties.rs    # Block-list guarantees
//!     ├── feedback_loop.rs # Gateway -> log -> detector -> gateway
//!     └── http_e2e.rs      # JSON-RPC over a real socket
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p dsa-tests
//! cargo test -p dsa-tests integration::http_e2e::
//! ```

pub mod integration;
