//! Live-view frame pipeline: decode a streamed frame, fit it inside the
//! viewport preserving aspect ratio, draw it, and release the buffer.

use image::GenericImageView;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{BoothcamError, Result};
use crate::sdk::CoordinateSystem;

/// Where a frame lands in the viewport, anchored top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Drawing surface for preview frames and captured stills.
pub trait Canvas: Send + Sync {
    fn draw_image(&self, image: &image::DynamicImage, rect: DrawRect);
    fn clear(&self);
}

/// Letterbox a frame into the viewport: the result touches the viewport
/// on one axis and preserves the frame's aspect ratio on the other.
pub fn fit_rect(frame_width: u32, frame_height: u32, view_width: u32, view_height: u32) -> DrawRect {
    let view_ratio = view_width as f32 / view_height as f32;
    let frame_ratio = frame_width as f32 / frame_height as f32;

    let (width, height) = if view_ratio < frame_ratio {
        (view_width, (view_width as f32 / frame_ratio) as u32)
    } else {
        ((view_height as f32 * frame_ratio) as u32, view_height)
    };

    DrawRect {
        x: 0,
        y: 0,
        width,
        height,
    }
}

/// Map a viewport click linearly into the device preview coordinate space.
pub fn map_click(
    x: u32,
    y: u32,
    view_width: u32,
    view_height: u32,
    coord: &CoordinateSystem,
) -> (u16, u16) {
    let device_x = (x as f64 / view_width as f64 * coord.width as f64) as u16;
    let device_y = (y as f64 / view_height as f64 * coord.height as f64) as u16;
    (device_x, device_y)
}

pub struct LiveViewPipeline {
    canvas: Arc<dyn Canvas>,
    view_width: u32,
    view_height: u32,
}

impl LiveViewPipeline {
    pub fn new(canvas: Arc<dyn Canvas>, view_width: u32, view_height: u32) -> Self {
        Self {
            canvas,
            view_width,
            view_height,
        }
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.view_width, self.view_height)
    }

    /// Decode and draw one streamed frame. The buffer is consumed and
    /// released before drawing so it can never outlive the call,
    /// whatever happens downstream.
    pub fn render_frame(&self, buffer: Vec<u8>) -> Result<()> {
        let decoded = image::load_from_memory(&buffer)
            .map_err(|e| BoothcamError::sdk_call("live_view_frame", e.to_string()))?;
        drop(buffer);

        self.draw(&decoded);
        Ok(())
    }

    /// Draw an already-decoded image (the captured still awaiting a
    /// decision) with the same letterbox fit.
    pub fn show_still(&self, image: &image::DynamicImage) {
        self.draw(image);
    }

    pub fn clear(&self) {
        self.canvas.clear();
    }

    fn draw(&self, image: &image::DynamicImage) {
        let (frame_width, frame_height) = image.dimensions();
        let rect = fit_rect(frame_width, frame_height, self.view_width, self.view_height);
        trace!(
            "Drawing {}x{} frame as {}x{}",
            frame_width,
            frame_height,
            rect.width,
            rect.height
        );
        self.canvas.draw_image(image, rect);
    }
}

/// Canvas that only logs draw calls, for terminal operation.
#[derive(Default)]
pub struct NullCanvas;

impl Canvas for NullCanvas {
    fn draw_image(&self, image: &image::DynamicImage, rect: DrawRect) {
        let (frame_width, frame_height) = image.dimensions();
        debug!(
            "Frame {}x{} drawn at {}x{}",
            frame_width, frame_height, rect.width, rect.height
        );
    }

    fn clear(&self) {}
}

/// Canvas that records draw calls, for headless runs and tests.
#[derive(Default)]
pub struct MemoryCanvas {
    draws: Mutex<Vec<(u32, u32, DrawRect)>>,
    cleared: Mutex<u32>,
}

impl MemoryCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded draws as (frame width, frame height, draw rect).
    pub fn draws(&self) -> Vec<(u32, u32, DrawRect)> {
        self.draws.lock().clone()
    }

    pub fn clear_count(&self) -> u32 {
        *self.cleared.lock()
    }
}

impl Canvas for MemoryCanvas {
    fn draw_image(&self, image: &image::DynamicImage, rect: DrawRect) {
        let (frame_width, frame_height) = image.dimensions();
        self.draws.lock().push((frame_width, frame_height, rect));
    }

    fn clear(&self) {
        *self.cleared.lock() += 1;
    }
}
