//! tiny-skia rendering for the spectrum plot

use super::plot::{Axes, PlotSurface};
use anyhow::{Context, Result, anyhow};
use std::path::Path;
use tiny_skia::*;

const MARGIN_LEFT: f32 = 56.0;
const MARGIN_RIGHT: f32 = 16.0;
const MARGIN_TOP: f32 = 16.0;
const MARGIN_BOTTOM: f32 = 32.0;

const PIXEL_SIZE: f32 = 2.0;
const CHAR_WIDTH: f32 = 6.0 * PIXEL_SIZE;
const CHAR_HEIGHT: f32 = 7.0 * PIXEL_SIZE;

const X_TICKS: usize = 4;

fn background() -> Color {
    Color::from_rgba8(250, 250, 250, 255)
}

fn frame() -> Color {
    Color::from_rgba8(60, 60, 60, 255)
}

fn label() -> Color {
    Color::from_rgba8(90, 90, 90, 255)
}

fn line() -> Color {
    Color::from_rgba8(220, 30, 30, 255)
}

/// Immediate-mode plot rendered into an in-memory pixmap
pub struct PixmapPlot {
    pixmap: Pixmap,
    axes: Axes,
    clip: Option<Mask>,
}

impl PixmapPlot {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("Failed to create {}x{} pixmap", width, height))?;
        let mut plot = Self {
            pixmap,
            axes: Axes::new(0.0, 1.0, 0.0, 1.0),
            clip: None,
        };
        plot.clip = plot.plot_mask();
        plot.pixmap.fill(background());
        Ok(plot)
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.pixmap
            .save_png(path)
            .with_context(|| format!("Failed to write PNG: {}", path.display()))?;
        tracing::info!(path = %path.display(), "saved plot snapshot");
        Ok(())
    }

    /// Plot area in pixels, inside the margins
    pub fn plot_rect(&self) -> Option<Rect> {
        Rect::from_ltrb(
            MARGIN_LEFT,
            MARGIN_TOP,
            self.pixmap.width() as f32 - MARGIN_RIGHT,
            self.pixmap.height() as f32 - MARGIN_BOTTOM,
        )
    }

    fn plot_mask(&self) -> Option<Mask> {
        let rect = self.plot_rect()?;
        let mut mask = Mask::new(self.pixmap.width(), self.pixmap.height())?;
        mask.fill_path(
            &PathBuilder::from_rect(rect),
            FillRule::Winding,
            false,
            Transform::identity(),
        );
        Some(mask)
    }

    fn to_pixel(&self, rect: &Rect, x: f32, y: f32) -> (f32, f32) {
        let px = rect.left() + self.axes.x_fraction(x) * rect.width();
        let py = rect.bottom() - self.axes.y_fraction(y) * rect.height();
        (px, py)
    }

    fn draw_frame(&mut self, rect: Rect) {
        let mut paint = Paint::default();
        paint.set_color(frame());
        paint.anti_alias = false;

        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        self.pixmap.stroke_path(
            &PathBuilder::from_rect(rect),
            &paint,
            &stroke,
            Transform::identity(),
            None,
        );
    }

    fn draw_labels(&mut self, rect: Rect) {
        let color = label();
        let axes = self.axes;

        // Amplitude range at the top and bottom of the y axis
        let top = format_value(axes.y_max);
        let bottom = format_value(axes.y_min);
        draw_text(
            &mut self.pixmap,
            &top,
            rect.left() - 4.0 - text_width(&top),
            rect.top(),
            color,
        );
        draw_text(
            &mut self.pixmap,
            &bottom,
            rect.left() - 4.0 - text_width(&bottom),
            rect.bottom() - CHAR_HEIGHT,
            color,
        );

        // Evenly spaced frequency ticks, centered under their position
        for i in 0..=X_TICKS {
            let fraction = i as f32 / X_TICKS as f32;
            let value = axes.x_min + fraction * (axes.x_max - axes.x_min);
            let text = format_value(value);
            let x = (rect.left() + fraction * rect.width() - text_width(&text) / 2.0)
                .clamp(0.0, (self.pixmap.width() as f32 - text_width(&text)).max(0.0));
            draw_text(&mut self.pixmap, &text, x, rect.bottom() + 8.0, color);
        }
    }
}

impl PlotSurface for PixmapPlot {
    fn is_open(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn clear(&mut self, axes: &Axes) {
        self.axes = *axes;
        self.pixmap.fill(background());

        if let Some(rect) = self.plot_rect() {
            self.draw_frame(rect);
            self.draw_labels(rect);
        }
    }

    fn draw_line(&mut self, xs: &[f32], ys: &[f32]) {
        let Some(rect) = self.plot_rect() else {
            return;
        };

        let mut pb = PathBuilder::new();
        for (i, (&x, &y)) in xs.iter().zip(ys).enumerate() {
            let (px, py) = self.to_pixel(&rect, x, y);
            if i == 0 {
                pb.move_to(px, py);
            } else {
                pb.line_to(px, py);
            }
        }
        let Some(path) = pb.finish() else {
            return;
        };

        let mut paint = Paint::default();
        paint.set_color(line());
        paint.anti_alias = true;

        let stroke = Stroke {
            width: 1.5,
            ..Stroke::default()
        };
        self.pixmap.stroke_path(
            &path,
            &paint,
            &stroke,
            Transform::identity(),
            self.clip.as_ref(),
        );
    }

    fn show(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Short axis label: "22K" for 22050, "800" for 800
fn format_value(value: f32) -> String {
    if value.abs() >= 1000.0 {
        format!("{}K", (value / 1000.0).round() as i64)
    } else {
        format!("{}", value.round() as i64)
    }
}

fn text_width(text: &str) -> f32 {
    text.chars().count() as f32 * CHAR_WIDTH
}

/// Draw simple text using rectangles (bitmap-style font)
fn draw_text(pixmap: &mut Pixmap, text: &str, x: f32, y: f32, color: Color) {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = false; // Sharp pixels for text

    for (i, ch) in text.chars().enumerate() {
        let char_x = x + i as f32 * CHAR_WIDTH;
        draw_char(pixmap, ch, char_x, y, &paint);
    }
}

/// 5x7 bitmap patterns (1 = filled) for the characters axis labels use
fn glyph(ch: char) -> [u8; 7] {
    match ch {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        _ => [0; 7], // Unknown char = blank
    }
}

fn draw_char(pixmap: &mut Pixmap, ch: char, x: f32, y: f32, paint: &Paint) {
    for (row, &bits) in glyph(ch).iter().enumerate() {
        for col in 0..5 {
            if (bits >> (4 - col)) & 1 == 1 {
                let px = x + col as f32 * PIXEL_SIZE;
                let py = y + row as f32 * PIXEL_SIZE;
                if let Some(rect) = Rect::from_xywh(px, py, PIXEL_SIZE, PIXEL_SIZE) {
                    pixmap.fill_rect(rect, paint, Transform::identity(), None);
                }
            }
        }
    }
}
