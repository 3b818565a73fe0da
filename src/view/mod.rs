pub mod chart;
pub mod format;
pub mod projection;
pub mod render;

pub use format::*;
pub use projection::*;
