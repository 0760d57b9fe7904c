//! Portfolio site renderer.
//!
//! The crate generates the static pages of the portfolio and drives the
//! interactive pieces that run on them: the animated topographic background
//! and the 3D scene widget that previews each project. Everything that
//! touches a window, a canvas or the network sits behind
//! [`platform::Platform`] and [`render::RenderSurface`], so the widget
//! lifecycle runs unchanged in tests, in a desktop window and in the browser.

pub mod background;
pub mod config;
pub mod error;
pub mod geometry;
pub mod model;
pub mod pages;
pub mod paths;
pub mod platform;
pub mod projects;
pub mod render;
pub mod resources;
pub mod scene;
#[cfg(target_arch = "wasm32")]
pub mod web;
pub mod widget;

pub use background::{compose_frame, Backdrop, BackdropFrame, TopographicBackground};
pub use config::SiteConfig;
pub use error::{ViewerError, ViewerResult};
pub use pages::{DetailView, ListingPage, Route};
pub use paths::{asset_path, DeployMode};
pub use platform::{HeadlessPlatform, Platform};
pub use projects::{ModelType, Project, PROJECTS};
pub use render::RenderSurface;
pub use widget::{SceneWidget, SessionSnapshot, WidgetProps};
