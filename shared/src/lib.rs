pub mod protocol;
pub mod entities;
pub mod geometry;

pub use protocol::*;
pub use entities::*;
pub use geometry::*;
