pub mod cli;
pub mod config;
pub mod driver;
pub mod emitter;
pub mod format;
pub mod loader;
pub mod memory;
pub mod reader;
pub mod relocator;

pub use driver::run;
pub use loader::{LoadedProgram, Loader};
