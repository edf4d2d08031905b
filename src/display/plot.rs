//! Drawing surface used by the live display

use anyhow::Result;

/// Fixed data ranges mapped onto the plot area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axes {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

impl Axes {
    pub fn new(x_min: f32, x_max: f32, y_min: f32, y_max: f32) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// Position of `x` across the x range, 0.0 at `x_min` and 1.0 at `x_max`
    pub fn x_fraction(&self, x: f32) -> f32 {
        fraction(x, self.x_min, self.x_max)
    }

    pub fn y_fraction(&self, y: f32) -> f32 {
        fraction(y, self.y_min, self.y_max)
    }
}

fn fraction(v: f32, min: f32, max: f32) -> f32 {
    let span = max - min;
    if span == 0.0 { 0.0 } else { (v - min) / span }
}

/// Something that can show a single 2D line plot
///
/// `clear` starts a new frame, `draw_line` adds to it, `show` makes it
/// visible. Data outside the axes is clipped when drawn, never altered.
pub trait PlotSurface {
    /// Pump pending events; `false` once the user has closed the surface.
    fn is_open(&mut self) -> Result<bool>;

    fn clear(&mut self, axes: &Axes);

    fn draw_line(&mut self, xs: &[f32], ys: &[f32]);

    fn show(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fractions() {
        let axes = Axes::new(0.0, 22050.0, 0.0, 4000.0);
        assert_eq!(axes.x_fraction(0.0), 0.0);
        assert_eq!(axes.x_fraction(22050.0), 1.0);
        assert_eq!(axes.y_fraction(2000.0), 0.5);
        // Out of range values are not clamped
        assert_eq!(axes.y_fraction(8000.0), 2.0);
    }

    #[test]
    fn test_degenerate_range() {
        let axes = Axes::new(1.0, 1.0, 0.0, 0.0);
        assert_eq!(axes.x_fraction(5.0), 0.0);
        assert_eq!(axes.y_fraction(5.0), 0.0);
    }
}
