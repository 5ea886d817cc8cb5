//! Zicsr semantics: CSR read/write, set, and clear, in register and
//! immediate forms. The decoder binds the source as either a register or a
//! 5-bit zero-extended immediate; the semantics are shared.

use rv32sim_core::ArchState;

use crate::exec::illegal;
use crate::inst::{Instruction, Operand, Outcome};

fn source_value(inst: &Instruction, st: &ArchState) -> u32 {
    match inst.srcs[0] {
        Operand::X(r) => st.xregs.read(r),
        Operand::Imm(v) => v as u32,
        other => unreachable!("csr source operand {other:?}"),
    }
}

/// csrrs/csrrc with x0 (or a zero immediate) as the source must not
/// perform the write at all, so read-only CSRs stay accessible.
fn source_is_zero_register(inst: &Instruction) -> bool {
    matches!(inst.srcs[0], Operand::X(0) | Operand::Imm(0))
}

pub fn csrrw(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let csr = inst.src_csr(1);
    let rd = inst.dst_x();
    // With rd = x0, csrrw shall not read the CSR.
    let old = if rd != 0 {
        match st.read_csr(csr) {
            Ok(v) => v,
            Err(_) => return illegal(inst, st),
        }
    } else {
        0
    };
    if st.write_csr(csr, source_value(inst, st)).is_err() {
        return illegal(inst, st);
    }
    st.xregs.write(rd, old);
    Outcome::Advance
}

pub fn csrrs(inst: &Instruction, st: &mut ArchState) -> Outcome {
    csr_read_modify(inst, st, |old, bits| old | bits)
}

pub fn csrrc(inst: &Instruction, st: &mut ArchState) -> Outcome {
    csr_read_modify(inst, st, |old, bits| old & !bits)
}

fn csr_read_modify(
    inst: &Instruction,
    st: &mut ArchState,
    apply: fn(u32, u32) -> u32,
) -> Outcome {
    let csr = inst.src_csr(1);
    let old = match st.read_csr(csr) {
        Ok(v) => v,
        Err(_) => return illegal(inst, st),
    };
    if !source_is_zero_register(inst) {
        let bits = source_value(inst, st);
        if st.write_csr(csr, apply(old, bits)).is_err() {
            return illegal(inst, st);
        }
    }
    st.xregs.write(inst.dst_x(), old);
    Outcome::Advance
}
