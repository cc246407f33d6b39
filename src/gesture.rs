//! Zoom and pan state driven by touch gestures

use serde::Serialize;

/// Smallest allowed zoom factor (page fits the width)
pub const MIN_SCALE: f32 = 1.0;
/// Largest allowed zoom factor
pub const MAX_SCALE: f32 = 3.0;

/// Translation in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Offset {
    pub x: f32,
    pub y: f32,
}

impl Offset {
    pub const ZERO: Offset = Offset { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Visible screen area in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSize {
    pub width: f32,
    pub height: f32,
}

impl ScreenSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Both dimensions finite and positive
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.width > 0.0 && self.height.is_finite() && self.height > 0.0
    }
}

/// One step of a multi-touch transform: pointer movement and zoom ratio
/// since the previous step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformGesture {
    pub pan: Offset,
    pub zoom: f32,
}

impl TransformGesture {
    pub fn new(pan: Offset, zoom: f32) -> Self {
        Self { pan, zoom }
    }

    /// Pure pinch without movement
    pub fn zoom(zoom: f32) -> Self {
        Self {
            pan: Offset::ZERO,
            zoom,
        }
    }
}

/// Per-page zoom state. Scale is kept within [`MIN_SCALE`, `MAX_SCALE`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomPan {
    scale: f32,
    offset: Offset,
    rotation_degrees: f32,
}

impl Default for ZoomPan {
    fn default() -> Self {
        Self {
            scale: MIN_SCALE,
            offset: Offset::ZERO,
            rotation_degrees: 0.0,
        }
    }
}

impl ZoomPan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn rotation_degrees(&self) -> f32 {
        self.rotation_degrees
    }

    pub fn is_zoomed(&self) -> bool {
        self.scale > MIN_SCALE
    }

    /// Set the scale, clamped. NaN is ignored.
    pub fn set_scale(&mut self, scale: f32) {
        if scale.is_nan() {
            return;
        }
        self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        if !self.is_zoomed() {
            self.offset = Offset::ZERO;
        }
    }

    /// Rotation of the displayed content; pan deltas are rotated by it
    pub fn set_rotation(&mut self, degrees: f32) {
        if degrees.is_finite() {
            self.rotation_degrees = degrees;
        }
    }

    /// Double tap: zoom all the way in, or back out if already zoomed
    pub fn toggle_zoom(&mut self) {
        let target = if self.is_zoomed() { MIN_SCALE } else { MAX_SCALE };
        self.set_scale(target);
    }

    /// Apply one transform step.
    ///
    /// While zoomed, the pan is scaled by the zoom, rotated by the content
    /// rotation and accumulated into the offset, which stays within
    /// ±screen × scale on each axis. At minimum zoom the offset is reset.
    pub fn apply(&mut self, gesture: TransformGesture, screen: ScreenSize) {
        self.set_scale(self.scale * gesture.zoom);
        if !self.is_zoomed() {
            return;
        }

        let x = gesture.pan.x * self.scale;
        let y = gesture.pan.y * self.scale;
        let angle = self.rotation_degrees.to_radians();
        let (sin, cos) = angle.sin_cos();

        let bound_x = screen.width * self.scale;
        let bound_y = screen.height * self.scale;
        self.offset.x = clamp_finite(self.offset.x + (x * cos - y * sin), bound_x);
        self.offset.y = clamp_finite(self.offset.y + (x * sin + y * cos), bound_y);
    }
}

fn clamp_finite(value: f32, bound: f32) -> f32 {
    if value.is_nan() || !(bound.is_finite() && bound > 0.0) {
        return 0.0;
    }
    value.clamp(-bound, bound)
}
