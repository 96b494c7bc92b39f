//! Document point space <-> viewport pixel space.
//!
//! `pixel = point * zoom + pan`. Both spaces are y-down with a top-left
//! origin. Zoom clamping belongs to [`Viewport`], not to the free functions.

use serde::{Deserialize, Serialize};

/// A position in document points (page-local, top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A position in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pixel {
    pub x: f32,
    pub y: f32,
}

impl Pixel {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in document points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Grow by `amount` on every side.
    pub fn inflate(&self, amount: f32) -> Rect {
        Rect::new(
            self.x - amount,
            self.y - amount,
            self.width + amount * 2.0,
            self.height + amount * 2.0,
        )
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Axis-aligned rectangle in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub fn to_viewport(point: Point, zoom: f32, pan: Pixel) -> Pixel {
    Pixel::new(point.x * zoom + pan.x, point.y * zoom + pan.y)
}

pub fn to_document(pixel: Pixel, zoom: f32, pan: Pixel) -> Point {
    Point::new((pixel.x - pan.x) / zoom, (pixel.y - pan.y) / zoom)
}

pub fn rect_to_viewport(rect: Rect, zoom: f32, pan: Pixel) -> PixelRect {
    let origin = to_viewport(Point::new(rect.x, rect.y), zoom, pan);
    PixelRect { x: origin.x, y: origin.y, width: rect.width * zoom, height: rect.height * zoom }
}

/// Zoom and pan of the editing surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    zoom: f32,
    pan: Pixel,
    min_zoom: f32,
    max_zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.3, 3.0)
    }
}

impl Viewport {
    pub fn new(min_zoom: f32, max_zoom: f32) -> Self {
        Self { zoom: 1.0_f32.clamp(min_zoom, max_zoom), pan: Pixel::default(), min_zoom, max_zoom }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan(&self) -> Pixel {
        self.pan
    }

    /// Set zoom, clamped to the configured bounds. Returns the applied value.
    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        }
        self.zoom
    }

    /// Multiply zoom by `factor` keeping the document point under `anchor` fixed.
    pub fn zoom_at(&mut self, anchor: Pixel, factor: f32) {
        let fixed = self.to_document(anchor);
        self.set_zoom(self.zoom * factor);
        self.pan = Pixel::new(anchor.x - fixed.x * self.zoom, anchor.y - fixed.y * self.zoom);
    }

    pub fn set_pan(&mut self, pan: Pixel) {
        self.pan = pan;
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan.x += dx;
        self.pan.y += dy;
    }

    pub fn to_viewport(&self, point: Point) -> Pixel {
        to_viewport(point, self.zoom, self.pan)
    }

    pub fn to_document(&self, pixel: Pixel) -> Point {
        to_document(pixel, self.zoom, self.pan)
    }

    pub fn rect_to_viewport(&self, rect: Rect) -> PixelRect {
        rect_to_viewport(rect, self.zoom, self.pan)
    }
}
