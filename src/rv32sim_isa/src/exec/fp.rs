//! F and D extension semantics.
//!
//! Arithmetic is computed with the host's IEEE-754 operations. NaN results
//! are canonicalized, single-precision values are NaN-boxed into the
//! 64-bit register cells, and the sticky flags are raised from operand and
//! result classification. The rounding mode is resolved from the
//! instruction's `rm` field (7 selects the dynamic `frm`); reserved modes
//! make the instruction illegal.

use rv32sim_core::fpu::{flags, RoundingMode};
use rv32sim_core::ArchState;

use crate::exec::illegal;
use crate::inst::{Instruction, Outcome};
use crate::exec::rv32i::effective_address;

const F32_CANONICAL_NAN: u32 = 0x7fc0_0000;
const F64_CANONICAL_NAN: u64 = 0x7ff8_0000_0000_0000;

fn is_snan32(bits: u32) -> bool {
    f32::from_bits(bits).is_nan() && bits & 0x0040_0000 == 0
}

fn is_snan64(bits: u64) -> bool {
    f64::from_bits(bits).is_nan() && bits & 0x0008_0000_0000_0000 == 0
}

fn canon32(x: f32) -> u32 {
    if x.is_nan() {
        F32_CANONICAL_NAN
    } else {
        x.to_bits()
    }
}

fn canon64(x: f64) -> u64 {
    if x.is_nan() {
        F64_CANONICAL_NAN
    } else {
        x.to_bits()
    }
}

/// Resolve the instruction's rounding mode; `None` means the encoding is
/// illegal (reserved static mode, or dynamic with a reserved `frm`).
fn resolve_rm(inst: &Instruction, st: &ArchState) -> Option<RoundingMode> {
    match inst.rm_field() {
        7 => st.fp.rounding_mode(),
        bits => RoundingMode::from_bits(bits),
    }
}

/// Round to integer in the given mode (on the f64 widening of the input,
/// so f32 conversions stay exact).
fn round_to_integer(x: f64, rm: RoundingMode) -> f64 {
    match rm {
        RoundingMode::Rne => x.round_ties_even(),
        RoundingMode::Rtz => x.trunc(),
        RoundingMode::Rdn => x.floor(),
        RoundingMode::Rup => x.ceil(),
        RoundingMode::Rmm => x.round(),
    }
}

// Loads and stores.

pub fn flw(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let addr = effective_address(inst, st);
    let bits = st.read_u32(addr);
    st.fregs.write_f32_bits(inst.dst_f(), bits);
    Outcome::Advance
}

pub fn fsw(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let addr = effective_address(inst, st);
    let bits = st.fregs.read_f32_bits(inst.src_f(2));
    st.write_u32(addr, bits);
    Outcome::Advance
}

pub fn fld(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let addr = effective_address(inst, st);
    let mut buf = [0u8; 8];
    st.read_memory(addr, &mut buf);
    st.fregs.write_raw(inst.dst_f(), u64::from_le_bytes(buf));
    Outcome::Advance
}

pub fn fsd(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let addr = effective_address(inst, st);
    let bits = st.fregs.read_raw(inst.src_f(2));
    st.write_memory(addr, &bits.to_le_bytes());
    Outcome::Advance
}

// Single-precision arithmetic.

fn binop_s(inst: &Instruction, st: &mut ArchState, op: fn(f32, f32) -> f32) -> Outcome {
    if resolve_rm(inst, st).is_none() {
        return illegal(inst, st);
    }
    let a_bits = st.fregs.read_f32_bits(inst.src_f(0));
    let b_bits = st.fregs.read_f32_bits(inst.src_f(1));
    let a = f32::from_bits(a_bits);
    let b = f32::from_bits(b_bits);
    let r = op(a, b);
    st.fp.raise(arith_flags32(a, b, r, is_snan32(a_bits) || is_snan32(b_bits)));
    st.fregs.write_f32_bits(inst.dst_f(), canon32(r));
    Outcome::Advance
}

/// Flag approximation for the binary arithmetic ops: invalid when a
/// signaling NaN comes in or a NaN is produced from non-NaN inputs;
/// divide-by-zero and overflow when an infinity appears from finite
/// operands.
fn arith_flags32(a: f32, b: f32, r: f32, snan_in: bool) -> u32 {
    let mut raised = 0;
    if snan_in || (r.is_nan() && !a.is_nan() && !b.is_nan()) {
        raised |= flags::NV;
    }
    if r.is_infinite() && a.is_finite() && b.is_finite() {
        if b == 0.0 {
            raised |= flags::DZ;
        } else {
            raised |= flags::OF | flags::NX;
        }
    }
    raised
}

fn arith_flags64(a: f64, b: f64, r: f64, snan_in: bool) -> u32 {
    let mut raised = 0;
    if snan_in || (r.is_nan() && !a.is_nan() && !b.is_nan()) {
        raised |= flags::NV;
    }
    if r.is_infinite() && a.is_finite() && b.is_finite() {
        if b == 0.0 {
            raised |= flags::DZ;
        } else {
            raised |= flags::OF | flags::NX;
        }
    }
    raised
}

pub fn fadd_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    binop_s(inst, st, |a, b| a + b)
}

pub fn fsub_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    binop_s(inst, st, |a, b| a - b)
}

pub fn fmul_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    binop_s(inst, st, |a, b| a * b)
}

pub fn fdiv_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    binop_s(inst, st, |a, b| a / b)
}

pub fn fsqrt_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    if resolve_rm(inst, st).is_none() {
        return illegal(inst, st);
    }
    let a_bits = st.fregs.read_f32_bits(inst.src_f(0));
    let a = f32::from_bits(a_bits);
    let r = a.sqrt();
    if is_snan32(a_bits) || (a < 0.0) {
        st.fp.raise(flags::NV);
    }
    st.fregs.write_f32_bits(inst.dst_f(), canon32(r));
    Outcome::Advance
}

// Sign injection: pure bit manipulation, no flags.

fn sgnj_s(inst: &Instruction, st: &mut ArchState, combine: fn(u32, u32) -> u32) -> Outcome {
    let a = st.fregs.read_f32_bits(inst.src_f(0));
    let b = st.fregs.read_f32_bits(inst.src_f(1));
    let sign = combine(a, b) & 0x8000_0000;
    st.fregs
        .write_f32_bits(inst.dst_f(), a & 0x7fff_ffff | sign);
    Outcome::Advance
}

pub fn fsgnj_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    sgnj_s(inst, st, |_a, b| b)
}

pub fn fsgnjn_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    sgnj_s(inst, st, |_a, b| !b)
}

pub fn fsgnjx_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    sgnj_s(inst, st, |a, b| a ^ b)
}

// Minimum/maximum with the RISC-V NaN and signed-zero rules.

fn minmax_s(inst: &Instruction, st: &mut ArchState, take_max: bool) -> Outcome {
    let a_bits = st.fregs.read_f32_bits(inst.src_f(0));
    let b_bits = st.fregs.read_f32_bits(inst.src_f(1));
    let a = f32::from_bits(a_bits);
    let b = f32::from_bits(b_bits);
    if is_snan32(a_bits) || is_snan32(b_bits) {
        st.fp.raise(flags::NV);
    }
    let r_bits = match (a.is_nan(), b.is_nan()) {
        (true, true) => F32_CANONICAL_NAN,
        (true, false) => b_bits,
        (false, true) => a_bits,
        (false, false) => {
            // -0.0 orders below +0.0.
            let pick_a = if a == b {
                (a_bits >> 31 == 1) != take_max
            } else {
                (a < b) != take_max
            };
            if pick_a {
                a_bits
            } else {
                b_bits
            }
        }
    };
    st.fregs.write_f32_bits(inst.dst_f(), r_bits);
    Outcome::Advance
}

pub fn fmin_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    minmax_s(inst, st, false)
}

pub fn fmax_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    minmax_s(inst, st, true)
}

// Comparisons write an integer register.

pub fn feq_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a_bits = st.fregs.read_f32_bits(inst.src_f(0));
    let b_bits = st.fregs.read_f32_bits(inst.src_f(1));
    // Quiet comparison: only signaling NaNs raise invalid.
    if is_snan32(a_bits) || is_snan32(b_bits) {
        st.fp.raise(flags::NV);
    }
    let r = f32::from_bits(a_bits) == f32::from_bits(b_bits);
    st.xregs.write(inst.dst_x(), r as u32);
    Outcome::Advance
}

fn ordered_cmp_s(inst: &Instruction, st: &mut ArchState, op: fn(f32, f32) -> bool) -> Outcome {
    let a = f32::from_bits(st.fregs.read_f32_bits(inst.src_f(0)));
    let b = f32::from_bits(st.fregs.read_f32_bits(inst.src_f(1)));
    // Signaling comparison: any NaN raises invalid.
    if a.is_nan() || b.is_nan() {
        st.fp.raise(flags::NV);
    }
    st.xregs.write(inst.dst_x(), op(a, b) as u32);
    Outcome::Advance
}

pub fn flt_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    ordered_cmp_s(inst, st, |a, b| a < b)
}

pub fn fle_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    ordered_cmp_s(inst, st, |a, b| a <= b)
}

/// The 10-bit classification mask shared by fclass.s/fclass.d.
fn classify(sign: bool, is_inf: bool, is_nan: bool, is_snan: bool, is_zero: bool, is_sub: bool) -> u32 {
    if is_nan {
        return if is_snan { 1 << 8 } else { 1 << 9 };
    }
    let positive_bit = match (is_inf, is_zero, is_sub) {
        (true, _, _) => 7,
        (_, true, _) => 4,
        (_, _, true) => 5,
        _ => 6,
    };
    // The negative classes mirror the positive ones in reverse order.
    if sign {
        1 << (7 - positive_bit)
    } else {
        1 << positive_bit
    }
}

pub fn fclass_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let bits = st.fregs.read_f32_bits(inst.src_f(0));
    let x = f32::from_bits(bits);
    let mask = classify(
        bits >> 31 != 0,
        x.is_infinite(),
        x.is_nan(),
        is_snan32(bits),
        x == 0.0,
        x.is_subnormal(),
    );
    st.xregs.write(inst.dst_x(), mask);
    Outcome::Advance
}

// Conversions.

fn to_i32(inst: &Instruction, st: &mut ArchState, value: f64, is_nan: bool) -> Option<u32> {
    let rm = resolve_rm(inst, st)?;
    let rounded = round_to_integer(value, rm);
    let (result, invalid) = if is_nan {
        (i32::MAX, true)
    } else if rounded < i32::MIN as f64 {
        (i32::MIN, true)
    } else if rounded > i32::MAX as f64 {
        (i32::MAX, true)
    } else {
        (rounded as i32, false)
    };
    if invalid {
        st.fp.raise(flags::NV);
    } else if rounded != value {
        st.fp.raise(flags::NX);
    }
    Some(result as u32)
}

fn to_u32(inst: &Instruction, st: &mut ArchState, value: f64, is_nan: bool) -> Option<u32> {
    let rm = resolve_rm(inst, st)?;
    let rounded = round_to_integer(value, rm);
    let (result, invalid) = if is_nan {
        (u32::MAX, true)
    } else if rounded < 0.0 {
        (0, true)
    } else if rounded > u32::MAX as f64 {
        (u32::MAX, true)
    } else {
        (rounded as u32, false)
    };
    if invalid {
        st.fp.raise(flags::NV);
    } else if rounded != value {
        st.fp.raise(flags::NX);
    }
    Some(result)
}

pub fn fcvt_w_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = f32::from_bits(st.fregs.read_f32_bits(inst.src_f(0)));
    match to_i32(inst, st, a as f64, a.is_nan()) {
        Some(v) => {
            st.xregs.write(inst.dst_x(), v);
            Outcome::Advance
        }
        None => illegal(inst, st),
    }
}

pub fn fcvt_wu_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = f32::from_bits(st.fregs.read_f32_bits(inst.src_f(0)));
    match to_u32(inst, st, a as f64, a.is_nan()) {
        Some(v) => {
            st.xregs.write(inst.dst_x(), v);
            Outcome::Advance
        }
        None => illegal(inst, st),
    }
}

pub fn fcvt_s_w(inst: &Instruction, st: &mut ArchState) -> Outcome {
    if resolve_rm(inst, st).is_none() {
        return illegal(inst, st);
    }
    let a = st.xregs.read(inst.src_x(0)) as i32;
    let r = a as f32;
    if r as i64 != a as i64 {
        st.fp.raise(flags::NX);
    }
    st.fregs.write_f32_bits(inst.dst_f(), canon32(r));
    Outcome::Advance
}

pub fn fcvt_s_wu(inst: &Instruction, st: &mut ArchState) -> Outcome {
    if resolve_rm(inst, st).is_none() {
        return illegal(inst, st);
    }
    let a = st.xregs.read(inst.src_x(0));
    let r = a as f32;
    if r as i64 != a as i64 {
        st.fp.raise(flags::NX);
    }
    st.fregs.write_f32_bits(inst.dst_f(), canon32(r));
    Outcome::Advance
}

// Bit moves between the register files.

pub fn fmv_x_w(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let bits = st.fregs.read_raw(inst.src_f(0)) as u32;
    st.xregs.write(inst.dst_x(), bits);
    Outcome::Advance
}

pub fn fmv_w_x(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let bits = st.xregs.read(inst.src_x(0));
    st.fregs.write_f32_bits(inst.dst_f(), bits);
    Outcome::Advance
}

// Fused multiply-add family: a single rounding via mul_add.

fn fma_s(inst: &Instruction, st: &mut ArchState, na: bool, nc: bool) -> Outcome {
    if resolve_rm(inst, st).is_none() {
        return illegal(inst, st);
    }
    let a_bits = st.fregs.read_f32_bits(inst.src_f(0));
    let b_bits = st.fregs.read_f32_bits(inst.src_f(1));
    let c_bits = st.fregs.read_f32_bits(inst.src_f(2));
    let mut a = f32::from_bits(a_bits);
    let b = f32::from_bits(b_bits);
    let mut c = f32::from_bits(c_bits);
    if na {
        a = -a;
    }
    if nc {
        c = -c;
    }
    let r = a.mul_add(b, c);
    let snan_in = is_snan32(a_bits) || is_snan32(b_bits) || is_snan32(c_bits);
    if snan_in || (r.is_nan() && !a.is_nan() && !b.is_nan() && !c.is_nan()) {
        st.fp.raise(flags::NV);
    }
    st.fregs.write_f32_bits(inst.dst_f(), canon32(r));
    Outcome::Advance
}

pub fn fmadd_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    fma_s(inst, st, false, false)
}

pub fn fmsub_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    fma_s(inst, st, false, true)
}

pub fn fnmsub_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    fma_s(inst, st, true, false)
}

pub fn fnmadd_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    fma_s(inst, st, true, true)
}

// Double precision. Same structure over the raw 64-bit cells.

fn binop_d(inst: &Instruction, st: &mut ArchState, op: fn(f64, f64) -> f64) -> Outcome {
    if resolve_rm(inst, st).is_none() {
        return illegal(inst, st);
    }
    let a_bits = st.fregs.read_raw(inst.src_f(0));
    let b_bits = st.fregs.read_raw(inst.src_f(1));
    let a = f64::from_bits(a_bits);
    let b = f64::from_bits(b_bits);
    let r = op(a, b);
    st.fp.raise(arith_flags64(a, b, r, is_snan64(a_bits) || is_snan64(b_bits)));
    st.fregs.write_raw(inst.dst_f(), canon64(r));
    Outcome::Advance
}

pub fn fadd_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    binop_d(inst, st, |a, b| a + b)
}

pub fn fsub_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    binop_d(inst, st, |a, b| a - b)
}

pub fn fmul_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    binop_d(inst, st, |a, b| a * b)
}

pub fn fdiv_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    binop_d(inst, st, |a, b| a / b)
}

pub fn fsqrt_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    if resolve_rm(inst, st).is_none() {
        return illegal(inst, st);
    }
    let a_bits = st.fregs.read_raw(inst.src_f(0));
    let a = f64::from_bits(a_bits);
    if is_snan64(a_bits) || (a < 0.0) {
        st.fp.raise(flags::NV);
    }
    st.fregs.write_raw(inst.dst_f(), canon64(a.sqrt()));
    Outcome::Advance
}

fn sgnj_d(inst: &Instruction, st: &mut ArchState, combine: fn(u64, u64) -> u64) -> Outcome {
    let a = st.fregs.read_raw(inst.src_f(0));
    let b = st.fregs.read_raw(inst.src_f(1));
    let sign = combine(a, b) & 0x8000_0000_0000_0000;
    st.fregs
        .write_raw(inst.dst_f(), a & 0x7fff_ffff_ffff_ffff | sign);
    Outcome::Advance
}

pub fn fsgnj_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    sgnj_d(inst, st, |_a, b| b)
}

pub fn fsgnjn_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    sgnj_d(inst, st, |_a, b| !b)
}

pub fn fsgnjx_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    sgnj_d(inst, st, |a, b| a ^ b)
}

fn minmax_d(inst: &Instruction, st: &mut ArchState, take_max: bool) -> Outcome {
    let a_bits = st.fregs.read_raw(inst.src_f(0));
    let b_bits = st.fregs.read_raw(inst.src_f(1));
    let a = f64::from_bits(a_bits);
    let b = f64::from_bits(b_bits);
    if is_snan64(a_bits) || is_snan64(b_bits) {
        st.fp.raise(flags::NV);
    }
    let r_bits = match (a.is_nan(), b.is_nan()) {
        (true, true) => F64_CANONICAL_NAN,
        (true, false) => b_bits,
        (false, true) => a_bits,
        (false, false) => {
            let pick_a = if a == b {
                (a_bits >> 63 == 1) != take_max
            } else {
                (a < b) != take_max
            };
            if pick_a {
                a_bits
            } else {
                b_bits
            }
        }
    };
    st.fregs.write_raw(inst.dst_f(), r_bits);
    Outcome::Advance
}

pub fn fmin_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    minmax_d(inst, st, false)
}

pub fn fmax_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    minmax_d(inst, st, true)
}

pub fn feq_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a_bits = st.fregs.read_raw(inst.src_f(0));
    let b_bits = st.fregs.read_raw(inst.src_f(1));
    if is_snan64(a_bits) || is_snan64(b_bits) {
        st.fp.raise(flags::NV);
    }
    let r = f64::from_bits(a_bits) == f64::from_bits(b_bits);
    st.xregs.write(inst.dst_x(), r as u32);
    Outcome::Advance
}

fn ordered_cmp_d(inst: &Instruction, st: &mut ArchState, op: fn(f64, f64) -> bool) -> Outcome {
    let a = f64::from_bits(st.fregs.read_raw(inst.src_f(0)));
    let b = f64::from_bits(st.fregs.read_raw(inst.src_f(1)));
    if a.is_nan() || b.is_nan() {
        st.fp.raise(flags::NV);
    }
    st.xregs.write(inst.dst_x(), op(a, b) as u32);
    Outcome::Advance
}

pub fn flt_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    ordered_cmp_d(inst, st, |a, b| a < b)
}

pub fn fle_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    ordered_cmp_d(inst, st, |a, b| a <= b)
}

pub fn fclass_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let bits = st.fregs.read_raw(inst.src_f(0));
    let x = f64::from_bits(bits);
    let mask = classify(
        bits >> 63 != 0,
        x.is_infinite(),
        x.is_nan(),
        is_snan64(bits),
        x == 0.0,
        x.is_subnormal(),
    );
    st.xregs.write(inst.dst_x(), mask);
    Outcome::Advance
}

pub fn fcvt_s_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    if resolve_rm(inst, st).is_none() {
        return illegal(inst, st);
    }
    let a_bits = st.fregs.read_raw(inst.src_f(0));
    let a = f64::from_bits(a_bits);
    let r = a as f32;
    if is_snan64(a_bits) {
        st.fp.raise(flags::NV);
    } else if !a.is_nan() && r as f64 != a {
        st.fp.raise(flags::NX);
    }
    st.fregs.write_f32_bits(inst.dst_f(), canon32(r));
    Outcome::Advance
}

pub fn fcvt_d_s(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a_bits = st.fregs.read_f32_bits(inst.src_f(0));
    if is_snan32(a_bits) {
        st.fp.raise(flags::NV);
    }
    let r = f32::from_bits(a_bits) as f64;
    st.fregs.write_raw(inst.dst_f(), canon64(r));
    Outcome::Advance
}

pub fn fcvt_w_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = f64::from_bits(st.fregs.read_raw(inst.src_f(0)));
    match to_i32(inst, st, a, a.is_nan()) {
        Some(v) => {
            st.xregs.write(inst.dst_x(), v);
            Outcome::Advance
        }
        None => illegal(inst, st),
    }
}

pub fn fcvt_wu_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = f64::from_bits(st.fregs.read_raw(inst.src_f(0)));
    match to_u32(inst, st, a, a.is_nan()) {
        Some(v) => {
            st.xregs.write(inst.dst_x(), v);
            Outcome::Advance
        }
        None => illegal(inst, st),
    }
}

pub fn fcvt_d_w(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0)) as i32;
    st.fregs.write_raw(inst.dst_f(), (a as f64).to_bits());
    Outcome::Advance
}

pub fn fcvt_d_wu(inst: &Instruction, st: &mut ArchState) -> Outcome {
    let a = st.xregs.read(inst.src_x(0));
    st.fregs.write_raw(inst.dst_f(), (a as f64).to_bits());
    Outcome::Advance
}

fn fma_d(inst: &Instruction, st: &mut ArchState, na: bool, nc: bool) -> Outcome {
    if resolve_rm(inst, st).is_none() {
        return illegal(inst, st);
    }
    let a_bits = st.fregs.read_raw(inst.src_f(0));
    let b_bits = st.fregs.read_raw(inst.src_f(1));
    let c_bits = st.fregs.read_raw(inst.src_f(2));
    let mut a = f64::from_bits(a_bits);
    let b = f64::from_bits(b_bits);
    let mut c = f64::from_bits(c_bits);
    if na {
        a = -a;
    }
    if nc {
        c = -c;
    }
    let r = a.mul_add(b, c);
    let snan_in = is_snan64(a_bits) || is_snan64(b_bits) || is_snan64(c_bits);
    if snan_in || (r.is_nan() && !a.is_nan() && !b.is_nan() && !c.is_nan()) {
        st.fp.raise(flags::NV);
    }
    st.fregs.write_raw(inst.dst_f(), canon64(r));
    Outcome::Advance
}

pub fn fmadd_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    fma_d(inst, st, false, false)
}

pub fn fmsub_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    fma_d(inst, st, false, true)
}

pub fn fnmsub_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    fma_d(inst, st, true, false)
}

pub fn fnmadd_d(inst: &Instruction, st: &mut ArchState) -> Outcome {
    fma_d(inst, st, true, true)
}
