pub mod dispatcher;
pub mod lifecycle;
pub mod poller;

pub use dispatcher::*;
pub use lifecycle::*;
pub use poller::*;
