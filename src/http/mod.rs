//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, metadata for error rendering)
//!     → trust::client_ip_middleware (ClientIp)
//!     → bind.rs (deserialize + validate parameters)
//!     → handlers.rs
//!     → error.rs (classify AppError, negotiate.rs picks the body format)
//!     → Send to client
//! ```

pub mod bind;
pub mod error;
pub mod handlers;
pub mod negotiate;
pub mod request;
pub mod server;

pub use bind::Bound;
pub use error::{error_responder, respond, server_error, AppError, BoxError, ErrorReport, HttpError};
pub use negotiate::{negotiate, parse_accept, AcceptEntry, Format};
pub use request::{MakeRequestUuid, RequestMeta, X_REQUEST_ID};
pub use server::{build_router, AppState, HttpServer, StartupError};
