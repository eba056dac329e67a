// Load pipeline: cache lookup, single-flight fetch, decode, gated delivery.

pub mod cache;
pub mod decoder;
pub mod fetch;
pub mod session;
pub mod stats;
