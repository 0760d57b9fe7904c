//! Environments a scene widget can be mounted into.

pub mod headless;
pub mod hub;

#[cfg(not(target_arch = "wasm32"))]
pub mod desktop;
#[cfg(target_arch = "wasm32")]
pub mod web;

use glam::Vec2;

use crate::error::ViewerResult;
use crate::render::RenderSurface;

pub use headless::{AssetSource, HeadlessPlatform};
pub use hub::{EventHub, Subscription};

/// Pointer position in viewport (client) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub client: Vec2,
}

/// Rectangle of the container in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn sized(width: f32, height: f32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width,
            height,
        }
    }

    /// Whole-pixel size, never below one pixel on either axis.
    pub fn pixel_size(&self) -> (u32, u32) {
        let clamp = |v: f32| if v.is_finite() { v.round().max(1.0) as u32 } else { 1 };
        (clamp(self.width), clamp(self.height))
    }
}

/// Maps a client-space pointer position into `[-1, 1]` on both axes with +y
/// up. Returns `None` for a container without area.
pub fn normalize_pointer(client: Vec2, bounds: Bounds) -> Option<Vec2> {
    if bounds.width <= 0.0 || bounds.height <= 0.0 {
        return None;
    }
    let x = (client.x - bounds.left) / bounds.width * 2.0 - 1.0;
    let y = -((client.y - bounds.top) / bounds.height * 2.0 - 1.0);
    Some(Vec2::new(x, y))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl FetchProgress {
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.loaded as f64 / total as f64 * 100.0),
            _ => None,
        }
    }
}

pub type PointerHandler = Box<dyn FnMut(PointerEvent)>;
pub type ResizeHandler = Box<dyn FnMut()>;
pub type FrameCallback = Box<dyn FnOnce()>;
pub type ProgressHandler = Box<dyn FnMut(FetchProgress)>;
pub type FetchCompletion = Box<dyn FnOnce(ViewerResult<Vec<u8>>)>;

/// Host services a widget needs: its container, listeners, frame scheduling
/// and asset fetching.
///
/// Listener and frame handles are RAII: dropping a `Listener` unregisters it
/// and dropping a `FrameRequest` cancels it if it has not fired. Fetch
/// callbacks always run on a later turn, never inside `fetch`.
pub trait Platform: 'static {
    type Listener;
    type FrameRequest;
    type Surface: RenderSurface;

    fn container_bounds(&self) -> Bounds;

    fn viewport_size(&self) -> (u32, u32);

    /// Removes anything left in the container by a previous mount.
    fn clear_container(&self);

    fn create_surface(&self, width: u32, height: u32) -> ViewerResult<Self::Surface>;

    fn listen_pointer(&self, handler: PointerHandler) -> Self::Listener;

    fn listen_resize(&self, handler: ResizeHandler) -> Self::Listener;

    fn request_frame(&self, callback: FrameCallback) -> Self::FrameRequest;

    fn fetch(&self, url: &str, on_progress: ProgressHandler, on_complete: FetchCompletion);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_normalization_corners() {
        let bounds = Bounds {
            left: 100.0,
            top: 50.0,
            width: 200.0,
            height: 100.0,
        };
        assert_eq!(
            normalize_pointer(Vec2::new(100.0, 50.0), bounds),
            Some(Vec2::new(-1.0, 1.0))
        );
        assert_eq!(
            normalize_pointer(Vec2::new(300.0, 150.0), bounds),
            Some(Vec2::new(1.0, -1.0))
        );
        assert_eq!(
            normalize_pointer(Vec2::new(200.0, 100.0), bounds),
            Some(Vec2::ZERO)
        );
        assert_eq!(normalize_pointer(Vec2::ZERO, Bounds::default()), None);
    }

    #[test]
    fn progress_percentages() {
        let progress = FetchProgress {
            loaded: 50,
            total: Some(200),
        };
        assert_eq!(progress.percent(), Some(25.0));
        assert_eq!(
            FetchProgress {
                loaded: 5,
                total: None
            }
            .percent(),
            None
        );
    }

    #[test]
    fn pixel_size_never_zero() {
        assert_eq!(Bounds::sized(0.0, 10.4).pixel_size(), (1, 10));
        assert_eq!(Bounds::sized(f32::NAN, 3.6).pixel_size(), (1, 4));
    }
}
