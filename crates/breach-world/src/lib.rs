//! World streaming for the Breach engine: baselines, render and collision
//! sinks, the region streamer, and the [`VoxelWorld`] facade.

pub mod baseline;
pub mod sink;
pub mod streamer;
pub mod world;

pub use baseline::{
    AuthoredBaseline, AuthoredBlock, AuthoredFill, AuthoredMap, Baseline, BaselineError,
    EmptyBaseline, FlatBaseline,
};
pub use sink::{MeshHandle, NullSink, RegionSink};
pub use streamer::{ObserverId, StreamReport, StreamerConfig, WorldStreamer};
pub use world::{VoxelWorld, WorldError, baseline_from_config, registry_from_config};
