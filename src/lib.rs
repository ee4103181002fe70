//! labelview - interactive label placement over images
//!
//! The core of a manga translation viewer: pan and zoom an image, place
//! numbered labels on it, keep a label list and the overlay focused on the
//! same label, and save edits optimistically with rollback on failure.
//!
//! The crate is UI-agnostic. A host owns one [`viewer::ImageViewer`] per
//! displayed image, feeds it input events and performs the label requests it
//! emits.

pub mod config;
pub mod constants;
pub mod coordinate_space;
pub mod edit_tracker;
pub mod error;
pub mod focus;
pub mod keybindings;
pub mod label;
pub mod label_overlay;
pub mod movable_area;
pub mod session;
pub mod viewer;
pub mod zoom_clamp;

pub use config::AppConfig;
pub use error::{RequestError, ViewerError};
pub use viewer::{ImageViewer, ViewerConfig, ViewerInput};
