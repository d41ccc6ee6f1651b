pub mod cleanup;
pub mod init;
pub mod render;
pub mod status;
pub mod validate;

pub use cleanup::*;
pub use init::*;
pub use render::*;
pub use status::*;
pub use validate::*;
