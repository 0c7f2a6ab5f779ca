//! Air-drawing canvas
//!
//! An index-finger pose draws, an open hand wipes the canvas, and the
//! index+middle pose over the confirm button sends the drawing to the AI.

pub mod raster;
pub mod state;

pub use raster::{RasterError, Rasterizer};
pub use state::{CanvasEvent, CanvasMachine, CanvasPhase, CanvasState, Segment};
