//! CLI commands implementation

pub mod init;
pub mod status;
pub mod sync;

pub use init::*;
pub use status::*;
pub use sync::*;
