//! Shared data model for the pas toolchain
//!
//! Everything both sides of the pipeline need to agree on lives here:
//! the linear three-address IR consumed by the optimizer, the interpreter
//! and the NASM backend, and the runtime [`Value`] type with the constant
//! evaluation rules shared by folding and execution.

pub mod ir;
pub mod value;

pub use ir::{BinaryOp, Instr, MAIN_LABEL, UnaryOp, render_listing};
pub use value::{EvalError, Value, eval_binary, eval_unary};
