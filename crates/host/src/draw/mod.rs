//! Drawing contract between scripts and the host: the recorded `ctx`
//! display list, the surface it replays onto, and a software rasterizer.

pub mod color;
mod context;
mod display_list;
pub(crate) mod font;
pub(crate) mod raster;
mod surface;

pub use color::{parse_css_color, with_alpha, Rgba};
pub use context::DrawContext;
pub use display_list::{DisplayList, DrawCommand, Transform, MAX_DRAW_COMMANDS, MAX_PATH_POINTS};
pub use raster::RasterSurface;
pub use surface::{DrawSurface, Point, Rect, RecordingSurface, Subpath, SurfaceCall, TextAlign};
