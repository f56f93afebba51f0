//! Console commands: parsing and execution.

pub mod interpreter;
pub mod parser;

pub use interpreter::{CommandInterpreter, Flow};
pub use parser::{parse, Command};
