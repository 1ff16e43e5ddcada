pub mod playlist;
pub mod query;
pub mod serialize;
pub mod tracks;

pub use playlist::*;
pub use query::*;
pub use serialize::*;
pub use tracks::*;
