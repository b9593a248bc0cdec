pub mod document;
pub mod frame;

pub use document::*;
pub use frame::*;
