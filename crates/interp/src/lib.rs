//! IR interpreter for the pas toolchain
//!
//! Executes the linear IR produced by the compiler crate: a single
//! instruction pointer, a global memory map and a stack of call frames,
//! no registers. All host interaction goes through the [`io`] contracts,
//! so the same machine runs under the CLI, under tests and under an
//! embedding GUI.

pub mod error;
pub mod io;
pub mod machine;

pub use error::RuntimeError;
pub use io::{FileSink, InputProvider, MemorySink, OutputSink, QueuedInput, StdinInput, StdoutSink};
pub use machine::Interpreter;
