//! VatraMC promotional site: status polling, the live map embed, in-page
//! navigation and the scroll-synced 3D background.

pub mod assets;
pub mod background;
pub mod cancel;
pub mod config;
pub mod content;
pub mod frames;
pub mod input;
pub mod map;
pub mod model;
pub mod nav;
pub mod render;
pub mod scene;
pub mod scroll;
pub mod status;
pub mod texture;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use assets::AssetStore;
pub use background::BackgroundScene;
pub use cancel::CancelToken;
pub use config::SiteConfig;
pub use frames::{AnimatedFrameSet, Frame, FrameAcquisition, FrameSource};
pub use input::{NamedKey, PreviewScroller, WheelDelta};
pub use map::{resolve_map_url, route_proxy, MapEmbed};
pub use model::Model;
pub use nav::{Navigator, ScrollHost};
pub use render::{Renderer, TickListener, TickListeners};
pub use scene::{Scene, SceneObject};
pub use scroll::{CameraRig, ScrollOffset};
pub use status::{HttpTransport, PollOutcome, StatusBoard, StatusPoller, StatusSnapshot};
pub use texture::{AnimatedTexture, TextureSampling};
