//! Client IP trust subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     directives ("trust XFF for 10.0.0.0/8", ...)
//!     → options.rs (parse CIDR, enforce one mode)
//!     → TrustConfig::apply()
//!     → IpExtractor (immutable, shared via Arc)
//!
//! Per request:
//!     → extractor.rs (peer address + headers → ClientIp)
//!     → request extensions
//! ```
//!
//! # Design Decisions
//! - X-Forwarded-For and X-Real-IP trust are mutually exclusive
//! - Configuration faults abort startup, they never reach request handling
//! - No request-time mutation

pub mod cidr;
pub mod extractor;
pub mod options;

pub use cidr::{Cidr, CidrError};
pub use extractor::{client_ip_middleware, ClientIp, IpExtractor};
pub use options::{TrustConfig, TrustDirective, TrustError, TrustMode};
