//! M-extension semantics: multiply and divide.
//!
//! Division never traps: divide-by-zero and signed-overflow produce the
//! architecturally defined results.

use rv32sim_core::ArchState;

use crate::inst::{Instruction, Outcome};

fn operands(inst: &Instruction, st: &ArchState) -> (u32, u32) {
    (
        st.xregs.read(inst.src_x(0)),
        st.xregs.read(inst.src_x(1)),
    )
}

pub fn mul(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let (a, b) = operands(inst, st);
    st.xregs.write(inst.dst_x(), a.wrapping_mul(b));
    Outcome::Advance
}

pub fn mulh(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let (a, b) = operands(inst, st);
    let wide = a as i32 as i64 * b as i32 as i64;
    st.xregs.write(inst.dst_x(), (wide >> 32) as u32);
    Outcome::Advance
}

pub fn mulhsu(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let (a, b) = operands(inst, st);
    let wide = a as i32 as i64 * b as i64;
    st.xregs.write(inst.dst_x(), (wide >> 32) as u32);
    Outcome::Advance
}

pub fn mulhu(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let (a, b) = operands(inst, st);
    let wide = a as u64 * b as u64;
    st.xregs.write(inst.dst_x(), (wide >> 32) as u32);
    Outcome::Advance
}

pub fn div(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let (a, b) = operands(inst, st);
    let (a, b) = (a as i32, b as i32);
    let q = if b == 0 {
        -1
    } else if a == i32::MIN && b == -1 {
        // Signed overflow: quotient is the dividend.
        i32::MIN
    } else {
        a / b
    };
    st.xregs.write(inst.dst_x(), q as u32);
    Outcome::Advance
}

pub fn divu(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let (a, b) = operands(inst, st);
    let q = if b == 0 { u32::MAX } else { a / b };
    st.xregs.write(inst.dst_x(), q);
    Outcome::Advance
}

pub fn rem(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let (a, b) = operands(inst, st);
    let (a, b) = (a as i32, b as i32);
    let r = if b == 0 {
        a
    } else if a == i32::MIN && b == -1 {
        0
    } else {
        a % b
    };
    st.xregs.write(inst.dst_x(), r as u32);
    Outcome::Advance
}

pub fn remu(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let (a, b) = operands(inst, st);
    let r = if b == 0 { a } else { a % b };
    st.xregs.write(inst.dst_x(), r);
    Outcome::Advance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm;
    use crate::decode::decode32;

    fn run2(raw: u32, a: u32, b: u32) -> u32 {
        let mut st = ArchState::new();
        st.xregs.write(1, a);
        st.xregs.write(2, b);
        decode32(raw).execute(&mut st);
        st.xregs.read(3)
    }

    #[test]
    fn multiply_halves() {
        assert_eq!(run2(asm::mul(3, 1, 2), 7, 6), 42);
        // -1 * -1: high half of the signed product is 0.
        assert_eq!(run2(asm::mulh(3, 1, 2), u32::MAX, u32::MAX), 0);
        // Unsigned: 0xffffffff^2 = 0xfffffffe_00000001.
        assert_eq!(run2(asm::mulhu(3, 1, 2), u32::MAX, u32::MAX), 0xffff_fffe);
        // Signed * unsigned: -1 * 0xffffffff = -0xffffffff.
        assert_eq!(run2(asm::mulhsu(3, 1, 2), u32::MAX, u32::MAX), u32::MAX);
    }

    #[test]
    fn divide_by_zero_is_defined() {
        assert_eq!(run2(asm::div(3, 1, 2), 17, 0), u32::MAX);
        assert_eq!(run2(asm::divu(3, 1, 2), 17, 0), u32::MAX);
        assert_eq!(run2(asm::rem(3, 1, 2), 17, 0), 17);
        assert_eq!(run2(asm::remu(3, 1, 2), 17, 0), 17);
    }

    #[test]
    fn signed_overflow_is_defined() {
        let min = i32::MIN as u32;
        assert_eq!(run2(asm::div(3, 1, 2), min, u32::MAX), min);
        assert_eq!(run2(asm::rem(3, 1, 2), min, u32::MAX), 0);
    }

    #[test]
    fn signed_rounds_toward_zero() {
        assert_eq!(run2(asm::div(3, 1, 2), -7i32 as u32, 2), -3i32 as u32);
        assert_eq!(run2(asm::rem(3, 1, 2), -7i32 as u32, 2), -1i32 as u32);
    }
}
