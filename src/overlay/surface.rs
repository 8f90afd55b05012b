use crate::error::SurfaceError;

use super::view::OverlayView;

/// Host-side window that draws overlay views.
///
/// `attach` is called once per session when it first becomes visible, and
/// `update` on every later transition while it stays visible.
pub trait RenderSurface: Send + Sync {
    fn attach(&self, view: &OverlayView) -> Result<(), SurfaceError>;
    fn update(&self, view: &OverlayView) -> Result<(), SurfaceError>;
    fn detach(&self, session_id: &str);
}
