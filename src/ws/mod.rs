pub mod address;
pub mod sessionctx;
pub mod transport;

pub use address::*;
pub use sessionctx::*;
pub use transport::*;
