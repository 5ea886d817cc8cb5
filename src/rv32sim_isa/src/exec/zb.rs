//! Zba/Zbb/Zbc/Zbs bit-manipulation semantics.
//!
//! The shift-amount operand of the rotates and the single-bit ops is a
//! register or a decoded shamt immediate; both bind as source 1 and the
//! amount is taken mod 32 either way.

use rv32sim_core::ArchState;

use crate::inst::{Instruction, Operand, Outcome};

fn src0(inst: &Instruction, st: &ArchState) -> u32 {
    st.xregs.read(inst.src_x(0))
}

fn src1(inst: &Instruction, st: &ArchState) -> u32 {
    match inst.srcs[1] {
        Operand::X(r) => st.xregs.read(r),
        Operand::Imm(v) => v as u32,
        other => unreachable!("bit-manip operand {other:?}"),
    }
}

fn write_rd(inst: &Instruction, st: &mut ArchState, value: u32) -> Outcome {
    st.xregs.write(inst.dst_x(), value);
    Outcome::Advance
}

// Zba: shift-and-add address generation.

fn sh_add(inst: &Instruction, st: &mut ArchState, shift: u32) -> Outcome {
    let a = src0(inst, st);
    let b = src1(inst, st);
    write_rd(inst, st, b.wrapping_add(a << shift))
}

pub fn sh1add(inst: &Instruction, st: &mut ArchState) -> Outcome {
    sh_add(inst, st, 1)
}

pub fn sh2add(inst: &Instruction, st: &mut ArchState) -> Outcome {
    sh_add(inst, st, 2)
}

pub fn sh3add(inst: &Instruction, st: &mut ArchState) -> Outcome {
    sh_add(inst, st, 3)
}

// Zbb: logic with negate.

pub fn andn(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st) & !src1(inst, st);
    write_rd(inst, st, r)
}

pub fn orn(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st) | !src1(inst, st);
    write_rd(inst, st, r)
}

pub fn xnor(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = !(src0(inst, st) ^ src1(inst, st));
    write_rd(inst, st, r)
}

// Zbb: counts.

pub fn clz(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st).leading_zeros();
    write_rd(inst, st, r)
}

pub fn ctz(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st).trailing_zeros();
    write_rd(inst, st, r)
}

pub fn cpop(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st).count_ones();
    write_rd(inst, st, r)
}

// Zbb: min/max.

pub fn min(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = (src0(inst, st) as i32).min(src1(inst, st) as i32) as u32;
    write_rd(inst, st, r)
}

pub fn max(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = (src0(inst, st) as i32).max(src1(inst, st) as i32) as u32;
    write_rd(inst, st, r)
}

pub fn minu(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st).min(src1(inst, st));
    write_rd(inst, st, r)
}

pub fn maxu(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st).max(src1(inst, st));
    write_rd(inst, st, r)
}

// Zbb: narrow-then-widen.

pub fn sext_b(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st) as i8 as i32 as u32;
    write_rd(inst, st, r)
}

pub fn sext_h(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st) as i16 as i32 as u32;
    write_rd(inst, st, r)
}

pub fn zext_h(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st) & 0xffff;
    write_rd(inst, st, r)
}

// Zbb: rotates. `rotate_left`/`rotate_right` are total in the shift
// amount, which covers the zero-shift case the naive
// `(a << b) | (a >> (32 - b))` formulation gets wrong.

pub fn rol(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st).rotate_left(src1(inst, st) & 0x1f);
    write_rd(inst, st, r)
}

pub fn ror(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st).rotate_right(src1(inst, st) & 0x1f);
    write_rd(inst, st, r)
}

// Zbb: byte ops.

pub fn orc_b(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = src0(inst, st);
    let mut r = 0u32;
    for byte in 0..4 {
        if a & (0xff << (8 * byte)) != 0 {
            r |= 0xff << (8 * byte);
        }
    }
    write_rd(inst, st, r)
}

pub fn rev8(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st).swap_bytes();
    write_rd(inst, st, r)
}

// Zbc: carry-less multiply. `clmul` is the low XLEN bits of the
// polynomial product, `clmulh` the high bits, `clmulr` bits
// [2·XLEN-2 : XLEN-1]. Loop bounds keep every shift in range.

pub fn clmul(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = src0(inst, st);
    let b = src1(inst, st);
    let mut r = 0u32;
    for i in 0..32 {
        if (b >> i) & 1 != 0 {
            r ^= a << i;
        }
    }
    write_rd(inst, st, r)
}

pub fn clmulh(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = src0(inst, st);
    let b = src1(inst, st);
    let mut r = 0u32;
    // The i = 0 term would be a >> 32, which contributes nothing.
    for i in 1..32 {
        if (b >> i) & 1 != 0 {
            r ^= a >> (32 - i);
        }
    }
    write_rd(inst, st, r)
}

pub fn clmulr(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = src0(inst, st);
    let b = src1(inst, st);
    let mut r = 0u32;
    for i in 0..32 {
        if (b >> i) & 1 != 0 {
            r ^= a >> (31 - i);
        }
    }
    write_rd(inst, st, r)
}

// Zbs: single-bit operations on bit rs2 mod 32.

pub fn bclr(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st) & !(1 << (src1(inst, st) & 0x1f));
    write_rd(inst, st, r)
}

pub fn bset(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st) | 1 << (src1(inst, st) & 0x1f);
    write_rd(inst, st, r)
}

pub fn binv(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st) ^ 1 << (src1(inst, st) & 0x1f);
    write_rd(inst, st, r)
}

pub fn bext(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let r = src0(inst, st) >> (src1(inst, st) & 0x1f) & 1;
    write_rd(inst, st, r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm;
    use crate::decode::decode32;
    use quickcheck_macros::quickcheck;

    /// Run a two-operand bit-manip encoding on fresh state.
    fn run2(raw: u32, a: u32, b: u32) -> u32 {
        let mut st = ArchState::new();
        st.xregs.write(1, a);
        st.xregs.write(2, b);
        decode32(raw).execute(&mut st);
        st.xregs.read(3)
    }

    fn run1(raw: u32, a: u32) -> u32 {
        let mut st = ArchState::new();
        st.xregs.write(1, a);
        decode32(raw).execute(&mut st);
        st.xregs.read(3)
    }

    #[quickcheck]
    fn rev8_is_an_involution(x: u32) -> bool {
        run1(asm::rev8(3, 1), run1(asm::rev8(3, 1), x)) == x
    }

    #[quickcheck]
    fn rol_is_inverse_of_ror(x: u32, k: u32) -> bool {
        run2(asm::rol(3, 1, 2), x, k) == run2(asm::ror(3, 1, 2), x, 32u32.wrapping_sub(k))
    }

    #[quickcheck]
    fn zero_rotate_is_identity(x: u32) -> bool {
        run2(asm::rol(3, 1, 2), x, 0) == x && run2(asm::ror(3, 1, 2), x, 0) == x
    }

    #[quickcheck]
    fn negated_logic_identities(x: u32) -> bool {
        run2(asm::andn(3, 1, 2), x, 0) == x
            && run2(asm::andn(3, 1, 2), x, u32::MAX) == 0
            && run2(asm::orn(3, 1, 2), x, 0) == u32::MAX
            && run2(asm::xnor(3, 1, 2), x, x) == u32::MAX
    }

    #[quickcheck]
    fn bext_of_bset(x: u32, k: u32) -> bool {
        let k = k & 0x1f;
        let set = run2(asm::bset(3, 1, 2), x, k);
        run2(asm::bext(3, 1, 2), set, k) == 1
            && run2(asm::bclr(3, 1, 2), set, k) == run2(asm::bclr(3, 1, 2), x, k)
    }

    #[quickcheck]
    fn binv_twice_is_identity(x: u32, k: u32) -> bool {
        let once = run2(asm::binv(3, 1, 2), x, k);
        run2(asm::binv(3, 1, 2), once, k) == x
    }

    #[quickcheck]
    fn sh_add_matches_definition(a: u32, b: u32) -> bool {
        run2(asm::sh1add(3, 1, 2), a, b) == b.wrapping_add(a.wrapping_mul(2))
            && run2(asm::sh2add(3, 1, 2), a, b) == b.wrapping_add(a.wrapping_mul(4))
            && run2(asm::sh3add(3, 1, 2), a, b) == b.wrapping_add(a.wrapping_mul(8))
    }

    #[quickcheck]
    fn clmul_shift_relation(a: u32, b: u32) -> bool {
        // The 64-bit polynomial product, bit by bit.
        let mut wide = 0u64;
        for i in 0..32 {
            if (b >> i) & 1 != 0 {
                wide ^= (a as u64) << i;
            }
        }
        run2(asm::clmul(3, 1, 2), a, b) == wide as u32
            && run2(asm::clmulh(3, 1, 2), a, b) == (wide >> 32) as u32
            && run2(asm::clmulr(3, 1, 2), a, b) == (wide >> 31) as u32
    }

    #[test]
    fn count_identities() {
        assert_eq!(run1(asm::clz(3, 1), 0), 32);
        assert_eq!(run1(asm::ctz(3, 1), 0), 32);
        for k in 0..32 {
            assert_eq!(run1(asm::clz(3, 1), 1 << k), 31 - k);
            assert_eq!(run1(asm::ctz(3, 1), 1 << k), k);
        }
        assert_eq!(run1(asm::cpop(3, 1), u32::MAX), 32);
        assert_eq!(run1(asm::cpop(3, 1), 0), 0);
    }

    #[test]
    fn clmul_reference_vector() {
        assert_eq!(run2(asm::clmul(3, 1, 2), u32::MAX, u32::MAX), 0x5555_5555);
        assert_eq!(run2(asm::clmulh(3, 1, 2), u32::MAX, u32::MAX), 0x5555_5555);
        // x^31 * x^31 = x^62; clmulr keeps bits [62:31].
        assert_eq!(
            run2(asm::clmulr(3, 1, 2), 0x8000_0000, 0x8000_0000),
            0x8000_0000
        );
    }

    #[test]
    fn orc_b_per_byte() {
        assert_eq!(run1(asm::orc_b(3, 1), 0x0010_0500), 0x00ff_ff00);
        assert_eq!(run1(asm::orc_b(3, 1), 0), 0);
        assert_eq!(run1(asm::orc_b(3, 1), 0x0100_0001), 0xff00_00ff);
    }

    #[test]
    fn sign_extension_ops() {
        assert_eq!(run1(asm::sext_b(3, 1), 0x0000_0080), 0xffff_ff80);
        assert_eq!(run1(asm::sext_b(3, 1), 0x0000_007f), 0x7f);
        assert_eq!(run1(asm::sext_h(3, 1), 0x0000_8000), 0xffff_8000);
        assert_eq!(run1(asm::zext_h(3, 1), 0xabcd_8000), 0x8000);
    }

    #[test]
    fn min_max_signedness() {
        assert_eq!(run2(asm::min(3, 1, 2), u32::MAX, 1), u32::MAX); // -1 < 1
        assert_eq!(run2(asm::minu(3, 1, 2), u32::MAX, 1), 1);
        assert_eq!(run2(asm::max(3, 1, 2), u32::MAX, 1), 1);
        assert_eq!(run2(asm::maxu(3, 1, 2), u32::MAX, 1), u32::MAX);
    }

    #[test]
    fn immediate_forms_match_register_forms() {
        for k in [0u8, 1, 7, 31] {
            assert_eq!(
                run2(asm::rori(3, 1, k), 0xdead_beef, 0),
                run2(asm::ror(3, 1, 2), 0xdead_beef, k as u32)
            );
            assert_eq!(
                run2(asm::bseti(3, 1, k), 0, 0),
                run2(asm::bset(3, 1, 2), 0, k as u32)
            );
            assert_eq!(
                run2(asm::bclri(3, 1, k), u32::MAX, 0),
                run2(asm::bclr(3, 1, 2), u32::MAX, k as u32)
            );
            assert_eq!(
                run2(asm::bexti(3, 1, k), 0xaaaa_aaaa, 0),
                run2(asm::bext(3, 1, 2), 0xaaaa_aaaa, k as u32)
            );
            assert_eq!(
                run2(asm::binvi(3, 1, k), 0x1234_5678, 0),
                run2(asm::binv(3, 1, 2), 0x1234_5678, k as u32)
            );
        }
    }
}
