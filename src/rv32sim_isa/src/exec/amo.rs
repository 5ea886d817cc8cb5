//! A-extension semantics: LR/SC and atomic read-modify-write.
//!
//! All atomics go through the state's atomic layer so reservations are
//! tracked uniformly; with a single hart each operation is indivisible
//! with respect to halt by construction (the run loop only stops at
//! instruction boundaries).

use rv32sim_core::{AmoOp, ArchState};

use crate::inst::{Instruction, Outcome};

pub fn lr_w(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let addr = st.xregs.read(inst.src_x(0));
    let value = st.read_u32(addr);
    st.atomics.reserve(addr);
    st.xregs.write(inst.dst_x(), value);
    Outcome::Advance
}

pub fn sc_w(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let addr = st.xregs.read(inst.src_x(0));
    let value = st.xregs.read(inst.src_x(1));
    if st.atomics.check_and_clear(addr) {
        st.write_u32(addr, value);
        st.xregs.write(inst.dst_x(), 0);
    } else {
        st.xregs.write(inst.dst_x(), 1);
    }
    Outcome::Advance
}

fn amo(inst: &Instruction, st: &mut ArchState, op: AmoOp) -> Outcome {
    let addr = st.xregs.read(inst.src_x(0));
    let src = st.xregs.read(inst.src_x(1));
    let old = st.atomics.amo(&mut st.mem, op, addr, src);
    st.xregs.write(inst.dst_x(), old);
    Outcome::Advance
}

pub fn amoswap_w(inst: &Instruction, st: &mut ArchState) -> Outcome {
    amo(inst, st, AmoOp::Swap)
}

pub fn amoadd_w(inst: &Instruction, st: &mut ArchState) -> Outcome {
    amo(inst, st, AmoOp::Add)
}

pub fn amoxor_w(inst: &Instruction, st: &mut ArchState) -> Outcome {
    amo(inst, st, AmoOp::Xor)
}

pub fn amoand_w(inst: &Instruction, st: &mut ArchState) -> Outcome {
    amo(inst, st, AmoOp::And)
}

pub fn amoor_w(inst: &Instruction, st: &mut ArchState) -> Outcome {
    amo(inst, st, AmoOp::Or)
}

pub fn amomin_w(inst: &Instruction, st: &mut ArchState) -> Outcome {
    amo(inst, st, AmoOp::Min)
}

pub fn amomax_w(inst: &Instruction, st: &mut ArchState) -> Outcome {
    amo(inst, st, AmoOp::Max)
}

pub fn amominu_w(inst: &Instruction, st: &mut ArchState) -> Outcome {
    amo(inst, st, AmoOp::Minu)
}

pub fn amomaxu_w(inst: &Instruction, st: &mut ArchState) -> Outcome {
    amo(inst, st, AmoOp::Maxu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm;
    use crate::decode::decode32;

    fn exec(st: &mut ArchState, raw: u32) {
        decode32(raw).execute(st);
    }

    #[test]
    fn lr_sc_success() {
        let mut st = ArchState::new();
        st.mem.store_u32(0x1000, 7);
        st.xregs.write(1, 0x1000);
        st.xregs.write(2, 9);
        exec(&mut st, asm::lr_w(3, 1));
        assert_eq!(st.xregs.read(3), 7);
        exec(&mut st, asm::sc_w(4, 1, 2));
        assert_eq!(st.xregs.read(4), 0);
        assert_eq!(st.mem.load_u32(0x1000), 9);
    }

    #[test]
    fn sc_fails_after_intervening_store() {
        let mut st = ArchState::new();
        st.xregs.write(1, 0x1000);
        st.xregs.write(2, 9);
        exec(&mut st, asm::lr_w(3, 1));
        // Another observer writes the reserved word.
        st.write_u32(0x1002, 0xbeef);
        exec(&mut st, asm::sc_w(4, 1, 2));
        assert_eq!(st.xregs.read(4), 1);
        // The conditional store must not have happened.
        assert_ne!(st.mem.load_u32(0x1000), 9);
    }

    #[test]
    fn sc_without_reservation_fails() {
        let mut st = ArchState::new();
        st.xregs.write(1, 0x1000);
        exec(&mut st, asm::sc_w(4, 1, 2));
        assert_eq!(st.xregs.read(4), 1);
    }

    #[test]
    fn amoadd_returns_old() {
        let mut st = ArchState::new();
        st.mem.store_u32(0x2000, 40);
        st.xregs.write(1, 0x2000);
        st.xregs.write(2, 2);
        exec(&mut st, asm::amoadd_w(3, 1, 2));
        assert_eq!(st.xregs.read(3), 40);
        assert_eq!(st.mem.load_u32(0x2000), 42);
    }

    #[test]
    fn amoswap_amoand_amoor() {
        let mut st = ArchState::new();
        st.mem.store_u32(0x2000, 0b1100);
        st.xregs.write(1, 0x2000);
        st.xregs.write(2, 0b1010);
        exec(&mut st, asm::amoand_w(3, 1, 2));
        assert_eq!(st.mem.load_u32(0x2000), 0b1000);
        exec(&mut st, asm::amoor_w(3, 1, 2));
        assert_eq!(st.mem.load_u32(0x2000), 0b1010);
        exec(&mut st, asm::amoswap_w(3, 1, 2));
        assert_eq!(st.xregs.read(3), 0b1010);
        assert_eq!(st.mem.load_u32(0x2000), 0b1010);
    }

    #[test]
    fn amomax_is_signed() {
        let mut st = ArchState::new();
        st.mem.store_u32(0x2000, -5i32 as u32);
        st.xregs.write(1, 0x2000);
        st.xregs.write(2, 3);
        exec(&mut st, asm::amomax_w(3, 1, 2));
        assert_eq!(st.mem.load_u32(0x2000), 3);
    }
}
