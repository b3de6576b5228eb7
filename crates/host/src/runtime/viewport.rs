use serde::Deserialize;
use tracing::debug;

/// A drawing-surface size that is finite and positive on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const FALLBACK: Viewport = Viewport {
        width: 800.0,
        height: 600.0,
    };

    /// `None` unless both sides are finite and positive.
    pub fn new(width: f64, height: f64) -> Option<Self> {
        let usable = |side: f64| side.is_finite() && side > 0.0;
        (usable(width) && usable(height)).then_some(Self { width, height })
    }

    pub fn as_tuple(self) -> (f64, f64) {
        (self.width, self.height)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Tracks the surface size. A degenerate observation never replaces the
/// committed size, but it marks the surface unusable until a good size
/// shows up again.
#[derive(Debug, Clone)]
pub struct ViewportGuard {
    committed: Viewport,
    degenerate: bool,
}

impl ViewportGuard {
    pub fn new(initial: Viewport) -> Self {
        let committed = Viewport::new(initial.width, initial.height).unwrap_or_default();
        Self {
            committed,
            degenerate: false,
        }
    }

    pub fn observe(&mut self, width: f64, height: f64) {
        match Viewport::new(width, height) {
            Some(viewport) => {
                if self.degenerate {
                    debug!(width, height, "viewport_recovered");
                }
                self.committed = viewport;
                self.degenerate = false;
            }
            None => {
                if !self.degenerate {
                    debug!(width, height, "viewport_degenerate");
                }
                self.degenerate = true;
            }
        }
    }

    /// The size scripts may use this tick, or `None` while degenerate.
    pub fn current(&self) -> Option<Viewport> {
        (!self.degenerate).then_some(self.committed)
    }

    /// Last committed good size, even while degenerate.
    pub fn safe_size(&self) -> Viewport {
        self.committed
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }
}

impl Default for ViewportGuard {
    fn default() -> Self {
        Self::new(Viewport::FALLBACK)
    }
}
