pub mod aggregator;
pub mod attributor;
pub mod dialect;
pub mod features;
pub mod ingest;
pub mod merger;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod segmenter;
pub mod workflow;
