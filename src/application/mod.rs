// Application layer - the order service and the text-payload contract surface.

pub mod contract;
pub mod error;
pub mod service;

pub use contract::OrderContract;
pub use error::*;
pub use service::*;
