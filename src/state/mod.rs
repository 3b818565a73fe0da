pub mod data;
pub mod store;

pub use data::*;
pub use store::*;
