//! Cairn core library: stable folder clustering for large flat namespaces.
//!
//! [`pipeline::ClusterPipeline`] runs analysis, the rule chain,
//! normalization and path assignment over an [`extract::ItemSet`];
//! [`pipeline::persist`] writes the report, redirect stubs and the next
//! [`store::IdentityCache`].

pub mod analyze;
pub mod config;
pub mod digest;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod paths;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod resolve;
pub mod store;
pub mod text;
pub mod types;
