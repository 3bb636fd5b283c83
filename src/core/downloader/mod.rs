pub mod client;
pub mod source;

pub use client::{FetchOutcome, FetchResult, Fetcher};
pub use source::{ArtifactSource, RemoteSource};
