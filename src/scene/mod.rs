//! The mutation side of the engine: shapes, the collaborators a move consults,
//! and the coordinator that keeps every floor's indices in step with them.

pub mod collaborators;
pub mod coordinator;
pub mod errors;
pub mod movement;
pub mod shapes;

pub use collaborators::*;
pub use coordinator::*;
pub use movement::*;
pub use shapes::*;
