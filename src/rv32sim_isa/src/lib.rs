//! Instruction decoding and semantics for RV32 G + V + Zb*.
//!
//! The decoder is table-driven: fixed mask/match patterns select an opcode,
//! a format-specific extractor binds operands, and the resulting
//! [`Instruction`] carries a plain function pointer to its semantic. The
//! semantics layer is a library of small stateless functions, one per
//! instruction, grouped by extension family under [`exec`].

pub mod asm;
pub mod decode;
pub mod exec;
pub mod inst;
pub mod rvc;

pub use decode::{decode32, decode_at};
pub use inst::{InstClass, Instruction, Operand, Outcome, SemanticFn};
