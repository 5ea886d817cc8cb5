//! V-extension semantics: configuration, unit-stride memory, integer ALU.
//!
//! Element loops run from `vstart` to `vl`, skip inactive elements when
//! the instruction is masked (`vm` = 0, mask in `v0`), and leave tail
//! elements undisturbed (a legal tail-agnostic implementation). `vstart`
//! resets to zero on successful completion.

use rv32sim_core::{ArchState, VLENB};

use crate::exec::illegal;
use crate::inst::{Instruction, Operand, Outcome};

/// Whether `vl` elements of `elem_bytes` starting at register `reg` stay
/// inside the register file. Encodings whose group would spill past v31
/// are reserved and decode to IllegalInstruction.
fn group_fits(reg: u8, vl: u32, elem_bytes: u32) -> bool {
    reg as u32 * VLENB + vl * elem_bytes <= 32 * VLENB
}

// Configuration.

fn apply_vset(inst: &Instruction, st: &mut ArchState, avl: u32, vtype: u32) -> Outcome {
    let vl = st.vector.apply_vset(avl, vtype);
    st.xregs.write(inst.dst_x(), vl);
    Outcome::Advance
}

pub fn vsetvli(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let vtype = inst.src_imm(1) as u32;
    let avl = match inst.srcs[0] {
        // rs1 = x0: keep vl if rd is also x0, else request the maximum.
        Operand::X(0) => {
            if inst.dst_x() == 0 {
                st.vector.vl
            } else {
                u32::MAX
            }
        }
        Operand::X(r) => st.xregs.read(r),
        other => unreachable!("vsetvli avl operand {other:?}"),
    };
    apply_vset(inst, st, avl, vtype)
}

pub fn vsetivli(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let avl = inst.src_imm(0) as u32;
    let vtype = inst.src_imm(1) as u32;
    apply_vset(inst, st, avl, vtype)
}

pub fn vsetvl(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let vtype = st.xregs.read(inst.src_x(1));
    let avl = match inst.srcs[0] {
        Operand::X(0) => {
            if inst.dst_x() == 0 {
                st.vector.vl
            } else {
                u32::MAX
            }
        }
        Operand::X(r) => st.xregs.read(r),
        other => unreachable!("vsetvl avl operand {other:?}"),
    };
    apply_vset(inst, st, avl, vtype)
}

// Unit-stride loads and stores. The effective element width comes from
// the encoding, independent of SEW.

fn v_load(inst: &Instruction, st: &mut ArchState, eew_bytes: u32) -> Outcome {
    if st.vector.vill() {
        return illegal(inst, st);
    }
    let base = st.xregs.read(inst.src_x(0));
    let vd = inst.dst_v();
    if !group_fits(vd, st.vector.vl, eew_bytes) {
        return illegal(inst, st);
    }
    let vm = inst.vm_field();
    let vl = st.vector.vl;
    for i in st.vector.vstart..vl {
        if !vm && !st.vregs.read_mask_bit(0, i) {
            continue;
        }
        let mut buf = [0u8; 4];
        st.read_memory(base.wrapping_add(i * eew_bytes), &mut buf[..eew_bytes as usize]);
        let value = u32::from_le_bytes(buf) as u64;
        st.vregs.write_element(vd, i * eew_bytes, eew_bytes, value);
    }
    st.vector.vstart = 0;
    Outcome::Advance
}

fn v_store(inst: &Instruction, st: &mut ArchState, eew_bytes: u32) -> Outcome {
    if st.vector.vill() {
        return illegal(inst, st);
    }
    let base = st.xregs.read(inst.src_x(0));
    let vs3 = inst.src_v(1);
    if !group_fits(vs3, st.vector.vl, eew_bytes) {
        return illegal(inst, st);
    }
    let vm = inst.vm_field();
    let vl = st.vector.vl;
    for i in st.vector.vstart..vl {
        if !vm && !st.vregs.read_mask_bit(0, i) {
            continue;
        }
        let value = st.vregs.read_element(vs3, i * eew_bytes, eew_bytes) as u32;
        let bytes = value.to_le_bytes();
        st.write_memory(base.wrapping_add(i * eew_bytes), &bytes[..eew_bytes as usize]);
    }
    st.vector.vstart = 0;
    Outcome::Advance
}

pub fn vle8(inst: &Instruction, st: &mut ArchState) -> Outcome {
    v_load(inst, st, 1)
}

pub fn vle16(inst: &Instruction, st: &mut ArchState) -> Outcome {
    v_load(inst, st, 2)
}

pub fn vle32(inst: &Instruction, st: &mut ArchState) -> Outcome {
    v_load(inst, st, 4)
}

pub fn vse8(inst: &Instruction, st: &mut ArchState) -> Outcome {
    v_store(inst, st, 1)
}

pub fn vse16(inst: &Instruction, st: &mut ArchState) -> Outcome {
    v_store(inst, st, 2)
}

pub fn vse32(inst: &Instruction, st: &mut ArchState) -> Outcome {
    v_store(inst, st, 4)
}

// Integer ALU over active elements.

fn v_arith(inst: &Instruction, st: &mut ArchState, op: fn(u64, u64) -> u64) -> Outcome {
    let Some(vtype) = st.vector.vtype() else {
        return illegal(inst, st);
    };
    let sew_bytes = vtype.sew / 8;
    let lane_mask = (1u64 << vtype.sew) - 1;
    let vs2 = inst.src_v(0);
    let vd = inst.dst_v();
    let vl = st.vector.vl;
    if !group_fits(vd, vl, sew_bytes) || !group_fits(vs2, vl, sew_bytes) {
        return illegal(inst, st);
    }
    if let Operand::V(vs1) = inst.srcs[1] {
        if !group_fits(vs1, vl, sew_bytes) {
            return illegal(inst, st);
        }
    }
    let vm = inst.vm_field();
    for i in st.vector.vstart..vl {
        if !vm && !st.vregs.read_mask_bit(0, i) {
            continue;
        }
        let a = st.vregs.read_element(vs2, i * sew_bytes, sew_bytes);
        let b = match inst.srcs[1] {
            Operand::V(r) => st.vregs.read_element(r, i * sew_bytes, sew_bytes),
            Operand::X(r) => st.xregs.read(r) as u64 & lane_mask,
            Operand::Imm(v) => v as u64 & lane_mask,
            other => unreachable!("vector operand {other:?}"),
        };
        st.vregs
            .write_element(vd, i * sew_bytes, sew_bytes, op(a, b) & lane_mask);
    }
    st.vector.vstart = 0;
    Outcome::Advance
}

pub fn vadd(inst: &Instruction, st: &mut ArchState) -> Outcome {
    v_arith(inst, st, |a, b| a.wrapping_add(b))
}

pub fn vsub(inst: &Instruction, st: &mut ArchState) -> Outcome {
    v_arith(inst, st, |a, b| a.wrapping_sub(b))
}

pub fn vand(inst: &Instruction, st: &mut ArchState) -> Outcome {
    v_arith(inst, st, |a, b| a & b)
}

pub fn vor(inst: &Instruction, st: &mut ArchState) -> Outcome {
    v_arith(inst, st, |a, b| a | b)
}

pub fn vxor(inst: &Instruction, st: &mut ArchState) -> Outcome {
    v_arith(inst, st, |a, b| a ^ b)
}
