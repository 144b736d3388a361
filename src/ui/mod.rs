/// UI module exports
pub mod components;
pub mod detached;
pub mod popup;
pub mod surface;

pub use surface::Services;
