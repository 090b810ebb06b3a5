pub mod obstruction;

pub use obstruction::*;
