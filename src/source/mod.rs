// Download service abstraction and its HTTP backend.

pub mod http_source;
pub mod traits;
