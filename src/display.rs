//! Spectrum plotting: drawing surface, renderer, window and live loop

mod live;
mod plot;
mod render;
mod window;

pub use live::LiveDisplay;
pub use plot::{Axes, PlotSurface};
pub use render::PixmapPlot;
pub use window::PlotWindow;
