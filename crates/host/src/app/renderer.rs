use std::sync::Arc;
use std::time::Instant;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::draw::color::BLACK;
use crate::draw::RasterSurface;
use crate::runtime::{Runtime, TickOutcome};

use super::overlay::{draw_fault_panel, draw_perf_panel, draw_virtual_pad, OverlayData};

/// Presents the script canvas plus host overlays through `pixels`.
///
/// The canvas is kept apart from the presented frame: scripts draw onto a
/// persistent buffer (like a browser canvas, it is only cleared when the
/// script clears it or the surface is resized) and overlays are composed on
/// a copy each frame so they never burn into the script's pixels.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    canvas: Vec<u8>,
    width: u32,
    height: u32,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            canvas: blank_canvas(size.width, size.height),
            width: size.width,
            height: size.height,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.canvas = blank_canvas(width, height);
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    /// Ticks the runtime against the canvas, then presents canvas and
    /// overlays.
    pub(crate) fn render_frame(
        &mut self,
        runtime: &mut Runtime,
        now: Instant,
        perf: Option<&OverlayData>,
    ) -> Result<TickOutcome, Error> {
        let (width, height) = (self.width, self.height);
        let outcome = if width == 0 || height == 0 {
            TickOutcome::Skipped
        } else {
            let mut surface = RasterSurface::new(&mut self.canvas, width, height);
            runtime.tick(now, &mut surface)
        };

        let frame = self.pixels.frame_mut();
        if frame.len() == self.canvas.len() {
            frame.copy_from_slice(&self.canvas);
        }

        let pressed: Vec<_> = runtime.input().pressed_pad_buttons().collect();
        draw_virtual_pad(frame, width, height, runtime.input().pad(), &pressed);
        if let Some(fault) = runtime.diagnostics().current() {
            draw_fault_panel(frame, width, height, fault);
        }
        if let Some(data) = perf {
            draw_perf_panel(frame, width, height, data);
        }

        self.pixels.render()?;
        Ok(outcome)
    }
}

fn blank_canvas(width: u32, height: u32) -> Vec<u8> {
    let pixel_count = width as usize * height as usize;
    BLACK.repeat(pixel_count)
}
