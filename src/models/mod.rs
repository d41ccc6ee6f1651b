pub mod category;
pub mod config;
pub mod failure;
pub mod outcome;
pub mod progress;
pub mod request;
pub mod state;
pub mod status;

pub use category::*;
pub use config::*;
pub use failure::*;
pub use outcome::*;
pub use progress::*;
pub use request::*;
pub use state::*;
pub use status::*;
