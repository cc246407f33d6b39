//! Geometry of the vertical page list

use crate::render::TargetSize;
use std::ops::Range;

/// Positions of equally sized pages stacked vertically with a fixed gap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    page_size: TargetSize,
    spacing: u32,
    page_count: u32,
}

impl PageLayout {
    pub fn new(page_size: TargetSize, spacing: u32, page_count: u32) -> Self {
        Self {
            page_size,
            spacing,
            page_count,
        }
    }

    pub fn page_size(&self) -> TargetSize {
        self.page_size
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    fn stride(&self) -> f64 {
        self.page_size.height as f64 + self.spacing as f64
    }

    /// Distance from the top of the list to the top of page `index`
    pub fn page_top(&self, index: u32) -> f64 {
        index as f64 * self.stride()
    }

    /// Height of the whole list, without trailing gap
    pub fn content_height(&self) -> f64 {
        if self.page_count == 0 {
            return 0.0;
        }
        self.page_count as f64 * self.stride() - self.spacing as f64
    }

    /// Keep a scroll offset within the list
    pub fn clamp_scroll(&self, offset: f64, viewport_height: f64) -> f64 {
        let max = (self.content_height() - viewport_height).max(0.0);
        if offset.is_nan() {
            return 0.0;
        }
        offset.clamp(0.0, max)
    }

    /// Pages intersecting the window `[offset, offset + viewport_height)`
    pub fn visible_range(&self, offset: f64, viewport_height: f64) -> Range<u32> {
        let stride = self.stride();
        if self.page_count == 0 || viewport_height <= 0.0 || stride <= 0.0 {
            return 0..0;
        }

        let offset = offset.max(0.0);
        let mut first = (offset / stride).floor() as u32;
        // Window starts inside the gap below `first`
        if offset >= self.page_top(first) + self.page_size.height as f64 {
            first += 1;
        }

        let end = offset + viewport_height;
        let last = ((end / stride).ceil() as u32).min(self.page_count);

        if first >= last {
            return 0..0;
        }
        first..last
    }
}
