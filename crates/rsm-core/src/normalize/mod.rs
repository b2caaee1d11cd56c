//! Frame discovery, decoding and monitor/attenuation normalization.

mod frames;
mod loader;
mod normalizer;
mod stack;

pub use frames::{FrameSelector, order_frames};
pub use loader::{Frame, FrameLoader, ImageFrameLoader};
pub use normalizer::{NormalizationFactors, Normalizer};
pub use stack::{LoadedFrames, RawFrameStack, load_frame_stack};
