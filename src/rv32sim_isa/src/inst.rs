//! The decoded-instruction model.

use rv32sim_core::ArchState;

/// A semantic is a function of a single decoded instruction: it reads the
/// operand values, computes, and writes the destination. Faults are
/// recorded into the state (never propagated as errors); the outcome tells
/// the run loop what happened to the PC.
pub type SemanticFn = fn(&Instruction, &mut ArchState) -> Outcome;

/// What the executed semantic did to control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// PC advances by the decoded width.
    Advance,
    /// The semantic computed the next PC itself (branch taken, jump).
    Jump(u32),
    /// A trap or halt was recorded; the PC stays at this instruction and
    /// it does not retire.
    Trapped,
}

/// An operand binding: a register cell (by index), an immediate, or a CSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    X(u8),
    F(u8),
    V(u8),
    Csr(u16),
    Imm(i64),
}

/// Coarse classification used by the retirement counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstClass {
    Alu,
    Load,
    Store,
    Branch,
    Jump,
    System,
    MulDiv,
    Atomic,
    Float,
    Vector,
}

impl InstClass {
    pub fn counter_name(self) -> &'static str {
        match self {
            Self::Alu => "alu",
            Self::Load => "loads",
            Self::Store => "stores",
            Self::Branch => "branches",
            Self::Jump => "jumps",
            Self::System => "system",
            Self::MulDiv => "muldiv",
            Self::Atomic => "atomics",
            Self::Float => "float",
            Self::Vector => "vector",
        }
    }
}

/// A decoded instruction: opcode identity, operand bindings, semantic
/// reference, and the encoded width (2 for expanded RVC, 4 otherwise).
#[derive(Clone, Copy)]
pub struct Instruction {
    pub mnemonic: &'static str,
    pub class: InstClass,
    pub srcs: [Operand; 3],
    pub dst: Operand,
    pub semantic: SemanticFn,
    /// Bytes the original encoding occupied; PC advances by this.
    pub width: u32,
    /// The (expanded) 32-bit encoding, for field re-extraction and trap
    /// values.
    pub raw: u32,
}

impl Instruction {
    pub fn execute(&self, state: &mut ArchState) -> Outcome {
        (self.semantic)(self, state)
    }

    /// Source `i` as an integer register index.
    ///
    /// The decoder guarantees operand kinds per format; a mismatch is an
    /// internal invariant violation.
    #[inline]
    pub fn src_x(&self, i: usize) -> u8 {
        match self.srcs[i] {
            Operand::X(r) => r,
            other => unreachable!("operand {i} of {} is {other:?}, not X", self.mnemonic),
        }
    }

    #[inline]
    pub fn src_f(&self, i: usize) -> u8 {
        match self.srcs[i] {
            Operand::F(r) => r,
            other => unreachable!("operand {i} of {} is {other:?}, not F", self.mnemonic),
        }
    }

    #[inline]
    pub fn src_v(&self, i: usize) -> u8 {
        match self.srcs[i] {
            Operand::V(r) => r,
            other => unreachable!("operand {i} of {} is {other:?}, not V", self.mnemonic),
        }
    }

    #[inline]
    pub fn src_imm(&self, i: usize) -> i64 {
        match self.srcs[i] {
            Operand::Imm(v) => v,
            other => unreachable!("operand {i} of {} is {other:?}, not Imm", self.mnemonic),
        }
    }

    #[inline]
    pub fn src_csr(&self, i: usize) -> u16 {
        match self.srcs[i] {
            Operand::Csr(a) => a,
            other => unreachable!("operand {i} of {} is {other:?}, not Csr", self.mnemonic),
        }
    }

    #[inline]
    pub fn dst_x(&self) -> u8 {
        match self.dst {
            Operand::X(r) => r,
            other => unreachable!("destination of {} is {other:?}, not X", self.mnemonic),
        }
    }

    #[inline]
    pub fn dst_f(&self) -> u8 {
        match self.dst {
            Operand::F(r) => r,
            other => unreachable!("destination of {} is {other:?}, not F", self.mnemonic),
        }
    }

    #[inline]
    pub fn dst_v(&self) -> u8 {
        match self.dst {
            Operand::V(r) => r,
            other => unreachable!("destination of {} is {other:?}, not V", self.mnemonic),
        }
    }

    /// The `rm` field (bits 14:12) of FP encodings.
    #[inline]
    pub fn rm_field(&self) -> u32 {
        (self.raw >> 12) & 7
    }

    /// The `vm` bit (bit 25) of vector encodings; clear means masked.
    #[inline]
    pub fn vm_field(&self) -> bool {
        (self.raw >> 25) & 1 != 0
    }
}

impl std::fmt::Debug for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instruction")
            .field("mnemonic", &self.mnemonic)
            .field("srcs", &self.srcs)
            .field("dst", &self.dst)
            .field("width", &self.width)
            .field("raw", &format_args!("{:#010x}", self.raw))
            .finish()
    }
}
