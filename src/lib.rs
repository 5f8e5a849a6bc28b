pub mod geometry;
mod renderer;
pub mod scene;
mod screen_block;

pub use crate::renderer::{RayGenerator, RenderProgress, RenderSettings, render};
pub use scene::{Scene, SceneBuilder};
pub use screen_block::InternalPoints;
