pub mod trading;
pub mod market;
pub mod balance;

pub use trading::*;
pub use market::*;
pub use balance::*;
