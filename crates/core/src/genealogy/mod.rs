#![forbid(unsafe_code)]

mod assemble;
mod marriages;
mod memory;
mod population;
mod tree;

pub use assemble::*;
pub use marriages::*;
pub use memory::*;
pub use population::*;
pub use tree::*;
