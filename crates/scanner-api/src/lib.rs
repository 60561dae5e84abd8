pub mod remote;
pub mod report;
pub mod routes;

pub use remote::{analyze_with_fallback, RemoteBackend, Source};
pub use routes::{router, serve};
