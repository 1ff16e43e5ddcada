pub mod base;
pub mod filters;
pub mod logging;
pub mod player;
pub mod queue;
pub mod voice;

pub use base::*;
pub use filters::*;
pub use logging::*;
pub use player::*;
pub use queue::*;
pub use voice::*;
