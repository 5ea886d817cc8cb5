//! RV32I base integer semantics.

use rv32sim_core::{ArchState, Handled, TrapCause};

use crate::exec::jump_to;
use crate::inst::{Instruction, Outcome};

// Register-register ALU.

pub fn add(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0));
    let b = st.xregs.read(inst.src_x(1));
    st.xregs.write(inst.dst_x(), a.wrapping_add(b));
    Outcome::Advance
}

pub fn sub(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0));
    let b = st.xregs.read(inst.src_x(1));
    st.xregs.write(inst.dst_x(), a.wrapping_sub(b));
    Outcome::Advance
}

pub fn slt(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0)) as i32;
    let b = st.xregs.read(inst.src_x(1)) as i32;
    st.xregs.write(inst.dst_x(), (a < b) as u32);
    Outcome::Advance
}

pub fn sltu(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0));
    let b = st.xregs.read(inst.src_x(1));
    st.xregs.write(inst.dst_x(), (a < b) as u32);
    Outcome::Advance
}

pub fn xor(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0));
    let b = st.xregs.read(inst.src_x(1));
    st.xregs.write(inst.dst_x(), a ^ b);
    Outcome::Advance
}

pub fn or(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0));
    let b = st.xregs.read(inst.src_x(1));
    st.xregs.write(inst.dst_x(), a | b);
    Outcome::Advance
}

pub fn and(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0));
    let b = st.xregs.read(inst.src_x(1));
    st.xregs.write(inst.dst_x(), a & b);
    Outcome::Advance
}

// Shifts. The second operand is a register (sll) or a decoded shamt
// immediate (slli); both bind as source 1 and the amount is masked to the
// low five bits either way.

fn shift_amount(inst: &Instruction, st: &ArchState) -> u32 {
    match inst.srcs[1] {
        crate::inst::Operand::X(r) => st.xregs.read(r) & 0x1f,
        crate::inst::Operand::Imm(v) => (v as u32) & 0x1f,
        other => unreachable!("shift amount operand {other:?}"),
    }
}

pub fn sll(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0));
    let sh = shift_amount(inst, st);
    st.xregs.write(inst.dst_x(), a << sh);
    Outcome::Advance
}

pub fn srl(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0));
    let sh = shift_amount(inst, st);
    st.xregs.write(inst.dst_x(), a >> sh);
    Outcome::Advance
}

pub fn sra(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0)) as i32;
    let sh = shift_amount(inst, st);
    st.xregs.write(inst.dst_x(), (a >> sh) as u32);
    Outcome::Advance
}

// Immediate ALU.

pub fn addi(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0));
    let imm = inst.src_imm(1) as u32;
    st.xregs.write(inst.dst_x(), a.wrapping_add(imm));
    Outcome::Advance
}

pub fn slti(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0)) as i32;
    let imm = inst.src_imm(1) as i32;
    st.xregs.write(inst.dst_x(), (a < imm) as u32);
    Outcome::Advance
}

pub fn sltiu(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0));
    let imm = inst.src_imm(1) as u32;
    st.xregs.write(inst.dst_x(), (a < imm) as u32);
    Outcome::Advance
}

pub fn xori(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0));
    st.xregs.write(inst.dst_x(), a ^ inst.src_imm(1) as u32);
    Outcome::Advance
}

pub fn ori(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0));
    st.xregs.write(inst.dst_x(), a | inst.src_imm(1) as u32);
    Outcome::Advance
}

pub fn andi(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0));
    st.xregs.write(inst.dst_x(), a & inst.src_imm(1) as u32);
    Outcome::Advance
}

pub fn lui(inst: &Instruction, st: &mut ArchState) -> Outcome {
    st.xregs.write(inst.dst_x(), inst.src_imm(0) as u32);
    Outcome::Advance
}

pub fn auipc(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let value = st.pc.wrapping_add(inst.src_imm(0) as u32);
    st.xregs.write(inst.dst_x(), value);
    Outcome::Advance
}

// Loads and stores. Unaligned access is permitted; the memory layer
// splits page-crossing accesses.

pub fn lb(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let addr = effective_address(inst, st);
    let value = st.read_u8(addr) as i8 as i32 as u32;
    st.xregs.write(inst.dst_x(), value);
    Outcome::Advance
}

pub fn lh(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let addr = effective_address(inst, st);
    let value = st.read_u16(addr) as i16 as i32 as u32;
    st.xregs.write(inst.dst_x(), value);
    Outcome::Advance
}

pub fn lw(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let addr = effective_address(inst, st);
    let value = st.read_u32(addr);
    st.xregs.write(inst.dst_x(), value);
    Outcome::Advance
}

pub fn lbu(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let addr = effective_address(inst, st);
    let value = st.read_u8(addr) as u32;
    st.xregs.write(inst.dst_x(), value);
    Outcome::Advance
}

pub fn lhu(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let addr = effective_address(inst, st);
    let value = st.read_u16(addr) as u32;
    st.xregs.write(inst.dst_x(), value);
    Outcome::Advance
}

pub fn sb(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let addr = effective_address(inst, st);
    let value = st.xregs.read(inst.src_x(2));
    st.write_u8(addr, value as u8);
    Outcome::Advance
}

pub fn sh(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let addr = effective_address(inst, st);
    let value = st.xregs.read(inst.src_x(2));
    st.write_u16(addr, value as u16);
    Outcome::Advance
}

pub fn sw(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let addr = effective_address(inst, st);
    let value = st.xregs.read(inst.src_x(2));
    st.write_u32(addr, value);
    Outcome::Advance
}

/// Base-plus-offset address of loads and stores.
pub(crate) fn effective_address(inst: &Instruction, st: &ArchState) -> u32 {
    st.xregs
        .read(inst.src_x(0))
        .wrapping_add(inst.src_imm(1) as u32)
}

// Branches: compare, and on success set PC to pc + sext(offset).

fn branch(inst: &Instruction, st: &mut ArchState, taken: bool) -> Outcome {
    if taken {
        let target = st.pc.wrapping_add(inst.src_imm(2) as u32);
        jump_to(st, target)
    } else {
        Outcome::Advance
    }
}

pub fn beq(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let taken = st.xregs.read(inst.src_x(0)) == st.xregs.read(inst.src_x(1));
    branch(inst, st, taken)
}

pub fn bne(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let taken = st.xregs.read(inst.src_x(0)) != st.xregs.read(inst.src_x(1));
    branch(inst, st, taken)
}

pub fn blt(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let taken = (st.xregs.read(inst.src_x(0)) as i32) < st.xregs.read(inst.src_x(1)) as i32;
    branch(inst, st, taken)
}

pub fn bge(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let taken = st.xregs.read(inst.src_x(0)) as i32 >= st.xregs.read(inst.src_x(1)) as i32;
    branch(inst, st, taken)
}

pub fn bltu(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let taken = st.xregs.read(inst.src_x(0)) < st.xregs.read(inst.src_x(1));
    branch(inst, st, taken)
}

pub fn bgeu(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let taken = st.xregs.read(inst.src_x(0)) >= st.xregs.read(inst.src_x(1));
    branch(inst, st, taken)
}

// Jumps. The link value is pc plus the *encoded* width, so expanded
// compressed jumps link past two bytes, not four.

pub fn jal(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let target = st.pc.wrapping_add(inst.src_imm(0) as u32);
    let link = st.pc.wrapping_add(inst.width);
    match jump_to(st, target) {
        Outcome::Jump(t) => {
            st.xregs.write(inst.dst_x(), link);
            Outcome::Jump(t)
        }
        other => other,
    }
}

pub fn jalr(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let base = st.xregs.read(inst.src_x(0));
    let target = base.wrapping_add(inst.src_imm(1) as u32) & !1;
    let link = st.pc.wrapping_add(inst.width);
    match jump_to(st, target) {
        Outcome::Jump(t) => {
            st.xregs.write(inst.dst_x(), link);
            Outcome::Jump(t)
        }
        other => other,
    }
}

// System.

/// Fences are no-ops for a single in-order hart; `fence.i` needs no
/// explicit action either because the engine invalidates cached decodes
/// on every store.
pub fn fence(_inst: &Instruction, _st: &mut ArchState) -> Outcome {
    Outcome::Advance
}

/// Offer the `ecall` to the installed handlers; unhandled calls trap.
pub fn ecall(_inst: &Instruction, st: &mut ArchState) -> Outcome {
    match st.raise_ecall() {
        Handled::Yes => {
            if st.has_pending_halt() {
                Outcome::Trapped
            } else {
                Outcome::Advance
            }
        }
        Handled::No => {
            st.trap(TrapCause::EnvironmentCall, st.pc, 0);
            Outcome::Trapped
        }
    }
}

/// Offer the `ebreak` to the installed handlers (software breakpoints,
/// ARM semihosting); unhandled breaks trap.
pub fn ebreak(_inst: &Instruction, st: &mut ArchState) -> Outcome {
    match st.raise_ebreak() {
        Handled::Yes => {
            if st.has_pending_halt() {
                Outcome::Trapped
            } else {
                Outcome::Advance
            }
        }
        Handled::No => {
            st.trap(TrapCause::Breakpoint, st.pc, st.pc);
            Outcome::Trapped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm;
    use crate::decode::decode32;
    use rv32sim_core::HaltReason;

    fn exec(st: &mut ArchState, raw: u32) -> Outcome {
        let inst = decode32(raw);
        inst.execute(st)
    }

    #[test]
    fn add_and_addi() {
        let mut st = ArchState::new();
        assert_eq!(exec(&mut st, asm::addi(1, 0, 5)), Outcome::Advance);
        assert_eq!(exec(&mut st, asm::add(2, 1, 1)), Outcome::Advance);
        assert_eq!(st.xregs.read(2), 10);
        // Writes to x0 are dropped.
        exec(&mut st, asm::addi(0, 0, 7));
        assert_eq!(st.xregs.read(0), 0);
    }

    #[test]
    fn shift_amounts_are_masked() {
        let mut st = ArchState::new();
        st.xregs.write(1, 1);
        st.xregs.write(2, 33); // effective shift 1
        exec(&mut st, asm::sll(3, 1, 2));
        assert_eq!(st.xregs.read(3), 2);
        st.xregs.write(4, 0x8000_0000);
        exec(&mut st, asm::srai(5, 4, 31));
        assert_eq!(st.xregs.read(5), 0xffff_ffff);
        exec(&mut st, asm::srli(5, 4, 31));
        assert_eq!(st.xregs.read(5), 1);
    }

    #[test]
    fn load_store_sign_extension() {
        let mut st = ArchState::new();
        st.xregs.write(1, 0x1000);
        st.xregs.write(2, 0xffff_ff80);
        exec(&mut st, asm::sb(1, 2, 0));
        exec(&mut st, asm::lb(3, 1, 0));
        assert_eq!(st.xregs.read(3), 0xffff_ff80);
        exec(&mut st, asm::lbu(3, 1, 0));
        assert_eq!(st.xregs.read(3), 0x80);
        exec(&mut st, asm::sh(1, 2, 4));
        exec(&mut st, asm::lh(3, 1, 4));
        assert_eq!(st.xregs.read(3), 0xffff_ff80);
        exec(&mut st, asm::lhu(3, 1, 4));
        assert_eq!(st.xregs.read(3), 0xff80);
    }

    #[test]
    fn negative_offsets() {
        let mut st = ArchState::new();
        st.xregs.write(1, 0x1010);
        st.xregs.write(2, 0x1234_5678);
        exec(&mut st, asm::sw(1, 2, -16));
        assert_eq!(st.mem.load_u32(0x1000), 0x1234_5678);
        exec(&mut st, asm::lw(3, 1, -16));
        assert_eq!(st.xregs.read(3), 0x1234_5678);
    }

    #[test]
    fn branches_compute_targets() {
        let mut st = ArchState::new();
        st.pc = 0x100;
        st.xregs.write(1, 5);
        st.xregs.write(2, 5);
        assert_eq!(exec(&mut st, asm::beq(1, 2, 64)), Outcome::Jump(0x140));
        assert_eq!(exec(&mut st, asm::bne(1, 2, 64)), Outcome::Advance);
        st.xregs.write(3, 0xffff_ffff); // -1 signed, huge unsigned
        assert_eq!(exec(&mut st, asm::blt(3, 1, -8)), Outcome::Jump(0xf8));
        assert_eq!(exec(&mut st, asm::bltu(3, 1, -8)), Outcome::Advance);
        assert_eq!(exec(&mut st, asm::bgeu(3, 1, 16)), Outcome::Jump(0x110));
    }

    #[test]
    fn jal_links_past_encoding_width() {
        let mut st = ArchState::new();
        st.pc = 0x200;
        assert_eq!(exec(&mut st, asm::jal(1, 0x80)), Outcome::Jump(0x280));
        assert_eq!(st.xregs.read(1), 0x204);

        st.pc = 0x300;
        st.xregs.write(5, 0x1001);
        // jalr clears bit 0 of the target.
        assert_eq!(exec(&mut st, asm::jalr(1, 5, 0x10)), Outcome::Jump(0x1010));
        assert_eq!(st.xregs.read(1), 0x304);
    }

    #[test]
    fn unhandled_ecall_traps() {
        let mut st = ArchState::new();
        st.pc = 0x40;
        assert_eq!(exec(&mut st, asm::ecall()), Outcome::Trapped);
        assert_eq!(st.csrs.mepc, 0x40);
        assert_eq!(st.csrs.mcause, 11);
        assert_eq!(
            st.take_pending_halt(),
            Some(HaltReason::FatalTrap(TrapCause::EnvironmentCall))
        );
    }

    #[test]
    fn handled_ecall_advances() {
        let mut st = ArchState::new();
        st.on_ecall(Box::new(|_| Handled::Yes));
        assert_eq!(exec(&mut st, asm::ecall()), Outcome::Advance);
        assert!(!st.has_pending_halt());
    }

    #[test]
    fn comparisons_are_signed_and_unsigned() {
        let mut st = ArchState::new();
        st.xregs.write(1, 0xffff_ffff); // -1 signed
        st.xregs.write(2, 1);
        exec(&mut st, asm::slt(3, 1, 2));
        assert_eq!(st.xregs.read(3), 1);
        exec(&mut st, asm::sltu(3, 1, 2));
        assert_eq!(st.xregs.read(3), 0);
        exec(&mut st, asm::slti(3, 1, 0));
        assert_eq!(st.xregs.read(3), 1);
        // sltiu compares against the sign-extended immediate as unsigned.
        exec(&mut st, asm::sltiu(3, 2, -1));
        assert_eq!(st.xregs.read(3), 1);
    }

    #[test]
    fn immediate_logic() {
        let mut st = ArchState::new();
        st.xregs.write(1, 0x0f0f_0f0f);
        exec(&mut st, asm::ori(3, 1, 0xf0));
        assert_eq!(st.xregs.read(3), 0x0f0f_0fff);
        exec(&mut st, asm::xori(3, 1, -1));
        assert_eq!(st.xregs.read(3), 0xf0f0_f0f0);
        exec(&mut st, asm::andi(3, 1, 0xff));
        assert_eq!(st.xregs.read(3), 0x0f);
    }

    #[test]
    fn register_shifts() {
        let mut st = ArchState::new();
        st.xregs.write(1, 0x8000_0010);
        st.xregs.write(2, 4);
        exec(&mut st, asm::srl(3, 1, 2));
        assert_eq!(st.xregs.read(3), 0x0800_0001);
        exec(&mut st, asm::sra(3, 1, 2));
        assert_eq!(st.xregs.read(3), 0xf800_0001);
    }

    #[test]
    fn bge_takes_on_equal() {
        let mut st = ArchState::new();
        st.pc = 0x100;
        st.xregs.write(1, 7);
        st.xregs.write(2, 7);
        assert_eq!(exec(&mut st, asm::bge(1, 2, 32)), Outcome::Jump(0x120));
    }

    #[test]
    fn fence_is_a_no_op() {
        let mut st = ArchState::new();
        assert_eq!(exec(&mut st, asm::fence()), Outcome::Advance);
    }

    #[test]
    fn lui_auipc() {
        let mut st = ArchState::new();
        st.pc = 0x1000;
        exec(&mut st, asm::lui(1, 0xdead0));
        assert_eq!(st.xregs.read(1), 0xdead_0000);
        exec(&mut st, asm::auipc(2, 0x1));
        assert_eq!(st.xregs.read(2), 0x2000);
    }
}
