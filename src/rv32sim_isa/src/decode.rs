//! Table-driven instruction decoder.
//!
//! Decoding is deterministic: fixed mask/match patterns select the opcode,
//! then a format-specific extractor binds operands (register indices and
//! sign-extended immediates) and attaches the semantic function. Compressed
//! encodings are expanded to their 32-bit equivalent first; the recorded
//! width stays 2 so PC advance is correct.

use rv32sim_core::ArchState;

use crate::exec;
use crate::inst::{InstClass, Instruction, Operand, SemanticFn};
use crate::rvc;

// Field extraction. Bit positions per the base instruction formats.

#[inline]
pub fn rd(raw: u32) -> u8 {
    ((raw >> 7) & 0x1f) as u8
}

#[inline]
pub fn rs1(raw: u32) -> u8 {
    ((raw >> 15) & 0x1f) as u8
}

#[inline]
pub fn rs2(raw: u32) -> u8 {
    ((raw >> 20) & 0x1f) as u8
}

#[inline]
pub fn rs3(raw: u32) -> u8 {
    ((raw >> 27) & 0x1f) as u8
}

#[inline]
fn imm_i(raw: u32) -> i64 {
    ((raw as i32) >> 20) as i64
}

#[inline]
fn imm_s(raw: u32) -> i64 {
    (((raw & 0xfe00_0000) as i32 >> 20) | ((raw >> 7) & 0x1f) as i32) as i64
}

#[inline]
fn imm_b(raw: u32) -> i64 {
    let imm = ((raw & 0x8000_0000) as i32 >> 19) as u32
        | ((raw >> 7) & 1) << 11
        | ((raw >> 25) & 0x3f) << 5
        | ((raw >> 8) & 0xf) << 1;
    imm as i32 as i64
}

#[inline]
fn imm_u(raw: u32) -> i64 {
    (raw & 0xffff_f000) as i32 as i64
}

#[inline]
fn imm_j(raw: u32) -> i64 {
    let imm = ((raw & 0x8000_0000) as i32 >> 11) as u32
        | (raw & 0x000f_f000)
        | ((raw >> 20) & 1) << 11
        | ((raw >> 21) & 0x3ff) << 1;
    imm as i32 as i64
}

/// Sign-extended 5-bit vector immediate (rs1 field position).
#[inline]
fn simm5(raw: u32) -> i64 {
    (((raw << 12) as i32) >> 27) as i64
}

/// Operand-binding formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    /// `[x rs1, x rs2] -> x rd`
    R,
    /// `[x rs1, sext imm12] -> x rd`
    I,
    /// `[x rs1, shamt5] -> x rd`
    Shamt,
    /// `[x rs1] -> x rd` (Zbb unary)
    Unary,
    /// `[imm20 << 12] -> x rd`
    U,
    /// `[sext jimm] -> x rd`
    J,
    /// `[x rs1, x rs2, sext bimm]`
    B,
    /// `[x rs1, sext simm, x rs2]`
    S,
    /// `[x rs1, csr] -> x rd`
    CsrReg,
    /// `[uimm5, csr] -> x rd`
    CsrImm,
    /// No bound operands (fence, ecall, ebreak).
    NoArgs,
    /// `[f rs1, f rs2] -> f rd`
    FpR,
    /// `[f rs1, f rs2, f rs3] -> f rd`
    FpR3,
    /// `[f rs1] -> f rd`
    FpF,
    /// `[x rs1, sext imm12] -> f rd`
    FpLoad,
    /// `[x rs1, sext simm, f rs2]`
    FpStore,
    /// `[f rs1] -> x rd`
    FpXF,
    /// `[x rs1] -> f rd`
    FpFX,
    /// `[f rs1, f rs2] -> x rd`
    FpCmp,
    /// `[x rs1, vtype-imm] -> x rd`
    Vsetvli,
    /// `[uimm5, vtype-imm] -> x rd`
    Vsetivli,
    /// `[x rs1, x rs2] -> x rd`
    Vsetvl,
    /// `[x rs1] -> v vd`
    VLoad,
    /// `[x rs1, v vs3]`
    VStore,
    /// `[v vs2, v vs1] -> v vd`
    VOpIVV,
    /// `[v vs2, x rs1] -> v vd`
    VOpIVX,
    /// `[v vs2, simm5] -> v vd`
    VOpIVI,
}

impl Format {
    fn bind(self, raw: u32) -> ([Operand; 3], Operand) {
        use Operand::*;
        match self {
            Self::R => ([X(rs1(raw)), X(rs2(raw)), None], X(rd(raw))),
            Self::I => ([X(rs1(raw)), Imm(imm_i(raw)), None], X(rd(raw))),
            Self::Shamt => ([X(rs1(raw)), Imm(rs2(raw) as i64), None], X(rd(raw))),
            Self::Unary => ([X(rs1(raw)), None, None], X(rd(raw))),
            Self::U => ([Imm(imm_u(raw)), None, None], X(rd(raw))),
            Self::J => ([Imm(imm_j(raw)), None, None], X(rd(raw))),
            Self::B => ([X(rs1(raw)), X(rs2(raw)), Imm(imm_b(raw))], None),
            Self::S => ([X(rs1(raw)), Imm(imm_s(raw)), X(rs2(raw))], None),
            Self::CsrReg => ([X(rs1(raw)), Csr((raw >> 20) as u16), None], X(rd(raw))),
            Self::CsrImm => (
                [Imm(rs1(raw) as i64), Csr((raw >> 20) as u16), None],
                X(rd(raw)),
            ),
            Self::NoArgs => ([None, None, None], None),
            Self::FpR => ([F(rs1(raw)), F(rs2(raw)), None], F(rd(raw))),
            Self::FpR3 => ([F(rs1(raw)), F(rs2(raw)), F(rs3(raw))], F(rd(raw))),
            Self::FpF => ([F(rs1(raw)), None, None], F(rd(raw))),
            Self::FpLoad => ([X(rs1(raw)), Imm(imm_i(raw)), None], F(rd(raw))),
            Self::FpStore => ([X(rs1(raw)), Imm(imm_s(raw)), F(rs2(raw))], None),
            Self::FpXF => ([F(rs1(raw)), None, None], X(rd(raw))),
            Self::FpFX => ([X(rs1(raw)), None, None], F(rd(raw))),
            Self::FpCmp => ([F(rs1(raw)), F(rs2(raw)), None], X(rd(raw))),
            Self::Vsetvli => (
                [X(rs1(raw)), Imm(((raw >> 20) & 0x7ff) as i64), None],
                X(rd(raw)),
            ),
            Self::Vsetivli => (
                [Imm(rs1(raw) as i64), Imm(((raw >> 20) & 0x3ff) as i64), None],
                X(rd(raw)),
            ),
            Self::Vsetvl => ([X(rs1(raw)), X(rs2(raw)), None], X(rd(raw))),
            Self::VLoad => ([X(rs1(raw)), None, None], V(rd(raw))),
            Self::VStore => ([X(rs1(raw)), V(rd(raw)), None], None),
            Self::VOpIVV => ([V(rs2(raw)), V(rs1(raw)), None], V(rd(raw))),
            Self::VOpIVX => ([V(rs2(raw)), X(rs1(raw)), None], V(rd(raw))),
            Self::VOpIVI => ([V(rs2(raw)), Imm(simm5(raw)), None], V(rd(raw))),
        }
    }
}

struct Pattern {
    mask: u32,
    bits: u32,
    mnemonic: &'static str,
    class: InstClass,
    format: Format,
    semantic: SemanticFn,
}

macro_rules! pat {
    ($mask:expr, $bits:expr, $mnemonic:expr, $class:ident, $format:ident, $semantic:path) => {
        Pattern {
            mask: $mask,
            bits: $bits,
            mnemonic: $mnemonic,
            class: InstClass::$class,
            format: Format::$format,
            semantic: $semantic,
        }
    };
}

/// The decode table. First match wins; rows with wider (more-specific)
/// masks precede the narrower patterns sharing their major opcode.
#[rustfmt::skip]
static TABLE: &[Pattern] = &[
    // System (exact encodings first).
    pat!(0xffff_ffff, 0x0000_0073, "ecall",   System, NoArgs, exec::rv32i::ecall),
    pat!(0xffff_ffff, 0x0010_0073, "ebreak",  System, NoArgs, exec::rv32i::ebreak),
    pat!(0x0000_707f, 0x0000_000f, "fence",   System, NoArgs, exec::rv32i::fence),
    pat!(0x0000_707f, 0x0000_100f, "fence.i", System, NoArgs, exec::rv32i::fence),
    pat!(0x0000_707f, 0x0000_1073, "csrrw",   System, CsrReg, exec::zicsr::csrrw),
    pat!(0x0000_707f, 0x0000_2073, "csrrs",   System, CsrReg, exec::zicsr::csrrs),
    pat!(0x0000_707f, 0x0000_3073, "csrrc",   System, CsrReg, exec::zicsr::csrrc),
    pat!(0x0000_707f, 0x0000_5073, "csrrwi",  System, CsrImm, exec::zicsr::csrrw),
    pat!(0x0000_707f, 0x0000_6073, "csrrsi",  System, CsrImm, exec::zicsr::csrrs),
    pat!(0x0000_707f, 0x0000_7073, "csrrci",  System, CsrImm, exec::zicsr::csrrc),

    // Upper-immediate and jumps.
    pat!(0x0000_007f, 0x0000_0037, "lui",   Alu,  U, exec::rv32i::lui),
    pat!(0x0000_007f, 0x0000_0017, "auipc", Alu,  U, exec::rv32i::auipc),
    pat!(0x0000_007f, 0x0000_006f, "jal",   Jump, J, exec::rv32i::jal),
    pat!(0x0000_707f, 0x0000_0067, "jalr",  Jump, I, exec::rv32i::jalr),

    // Branches.
    pat!(0x0000_707f, 0x0000_0063, "beq",  Branch, B, exec::rv32i::beq),
    pat!(0x0000_707f, 0x0000_1063, "bne",  Branch, B, exec::rv32i::bne),
    pat!(0x0000_707f, 0x0000_4063, "blt",  Branch, B, exec::rv32i::blt),
    pat!(0x0000_707f, 0x0000_5063, "bge",  Branch, B, exec::rv32i::bge),
    pat!(0x0000_707f, 0x0000_6063, "bltu", Branch, B, exec::rv32i::bltu),
    pat!(0x0000_707f, 0x0000_7063, "bgeu", Branch, B, exec::rv32i::bgeu),

    // Loads and stores.
    pat!(0x0000_707f, 0x0000_0003, "lb",  Load,  I, exec::rv32i::lb),
    pat!(0x0000_707f, 0x0000_1003, "lh",  Load,  I, exec::rv32i::lh),
    pat!(0x0000_707f, 0x0000_2003, "lw",  Load,  I, exec::rv32i::lw),
    pat!(0x0000_707f, 0x0000_4003, "lbu", Load,  I, exec::rv32i::lbu),
    pat!(0x0000_707f, 0x0000_5003, "lhu", Load,  I, exec::rv32i::lhu),
    pat!(0x0000_707f, 0x0000_0023, "sb",  Store, S, exec::rv32i::sb),
    pat!(0x0000_707f, 0x0000_1023, "sh",  Store, S, exec::rv32i::sh),
    pat!(0x0000_707f, 0x0000_2023, "sw",  Store, S, exec::rv32i::sw),

    // Zbb unary and the OP-IMM bit-manipulation rows (full funct7/funct12
    // masks; listed before the base shifts that share funct3 slots).
    pat!(0xfff0_707f, 0x6000_1013, "clz",    Alu, Unary, exec::zb::clz),
    pat!(0xfff0_707f, 0x6010_1013, "ctz",    Alu, Unary, exec::zb::ctz),
    pat!(0xfff0_707f, 0x6020_1013, "cpop",   Alu, Unary, exec::zb::cpop),
    pat!(0xfff0_707f, 0x6040_1013, "sext.b", Alu, Unary, exec::zb::sext_b),
    pat!(0xfff0_707f, 0x6050_1013, "sext.h", Alu, Unary, exec::zb::sext_h),
    pat!(0xfff0_707f, 0x2870_5013, "orc.b",  Alu, Unary, exec::zb::orc_b),
    pat!(0xfff0_707f, 0x6980_5013, "rev8",   Alu, Unary, exec::zb::rev8),
    pat!(0xfe00_707f, 0x6000_5013, "rori",   Alu, Shamt, exec::zb::ror),
    pat!(0xfe00_707f, 0x4800_1013, "bclri",  Alu, Shamt, exec::zb::bclr),
    pat!(0xfe00_707f, 0x2800_1013, "bseti",  Alu, Shamt, exec::zb::bset),
    pat!(0xfe00_707f, 0x6800_1013, "binvi",  Alu, Shamt, exec::zb::binv),
    pat!(0xfe00_707f, 0x4800_5013, "bexti",  Alu, Shamt, exec::zb::bext),

    // OP-IMM.
    pat!(0x0000_707f, 0x0000_0013, "addi",  Alu, I, exec::rv32i::addi),
    pat!(0x0000_707f, 0x0000_2013, "slti",  Alu, I, exec::rv32i::slti),
    pat!(0x0000_707f, 0x0000_3013, "sltiu", Alu, I, exec::rv32i::sltiu),
    pat!(0x0000_707f, 0x0000_4013, "xori",  Alu, I, exec::rv32i::xori),
    pat!(0x0000_707f, 0x0000_6013, "ori",   Alu, I, exec::rv32i::ori),
    pat!(0x0000_707f, 0x0000_7013, "andi",  Alu, I, exec::rv32i::andi),
    pat!(0xfe00_707f, 0x0000_1013, "slli",  Alu, Shamt, exec::rv32i::sll),
    pat!(0xfe00_707f, 0x0000_5013, "srli",  Alu, Shamt, exec::rv32i::srl),
    pat!(0xfe00_707f, 0x4000_5013, "srai",  Alu, Shamt, exec::rv32i::sra),

    // Zba / Zbb / Zbc / Zbs register forms and zext.h (full funct7 masks;
    // listed before the base OP rows).
    pat!(0xfff0_707f, 0x0800_4033, "zext.h", Alu, Unary, exec::zb::zext_h),
    pat!(0xfe00_707f, 0x2000_2033, "sh1add", Alu, R, exec::zb::sh1add),
    pat!(0xfe00_707f, 0x2000_4033, "sh2add", Alu, R, exec::zb::sh2add),
    pat!(0xfe00_707f, 0x2000_6033, "sh3add", Alu, R, exec::zb::sh3add),
    pat!(0xfe00_707f, 0x4000_7033, "andn",   Alu, R, exec::zb::andn),
    pat!(0xfe00_707f, 0x4000_6033, "orn",    Alu, R, exec::zb::orn),
    pat!(0xfe00_707f, 0x4000_4033, "xnor",   Alu, R, exec::zb::xnor),
    pat!(0xfe00_707f, 0x0a00_4033, "min",    Alu, R, exec::zb::min),
    pat!(0xfe00_707f, 0x0a00_5033, "minu",   Alu, R, exec::zb::minu),
    pat!(0xfe00_707f, 0x0a00_6033, "max",    Alu, R, exec::zb::max),
    pat!(0xfe00_707f, 0x0a00_7033, "maxu",   Alu, R, exec::zb::maxu),
    pat!(0xfe00_707f, 0x6000_1033, "rol",    Alu, R, exec::zb::rol),
    pat!(0xfe00_707f, 0x6000_5033, "ror",    Alu, R, exec::zb::ror),
    pat!(0xfe00_707f, 0x0a00_1033, "clmul",  Alu, R, exec::zb::clmul),
    pat!(0xfe00_707f, 0x0a00_3033, "clmulh", Alu, R, exec::zb::clmulh),
    pat!(0xfe00_707f, 0x0a00_2033, "clmulr", Alu, R, exec::zb::clmulr),
    pat!(0xfe00_707f, 0x4800_1033, "bclr",   Alu, R, exec::zb::bclr),
    pat!(0xfe00_707f, 0x2800_1033, "bset",   Alu, R, exec::zb::bset),
    pat!(0xfe00_707f, 0x6800_1033, "binv",   Alu, R, exec::zb::binv),
    pat!(0xfe00_707f, 0x4800_5033, "bext",   Alu, R, exec::zb::bext),

    // M extension.
    pat!(0xfe00_707f, 0x0200_0033, "mul",    MulDiv, R, exec::mul::mul),
    pat!(0xfe00_707f, 0x0200_1033, "mulh",   MulDiv, R, exec::mul::mulh),
    pat!(0xfe00_707f, 0x0200_2033, "mulhsu", MulDiv, R, exec::mul::mulhsu),
    pat!(0xfe00_707f, 0x0200_3033, "mulhu",  MulDiv, R, exec::mul::mulhu),
    pat!(0xfe00_707f, 0x0200_4033, "div",    MulDiv, R, exec::mul::div),
    pat!(0xfe00_707f, 0x0200_5033, "divu",   MulDiv, R, exec::mul::divu),
    pat!(0xfe00_707f, 0x0200_6033, "rem",    MulDiv, R, exec::mul::rem),
    pat!(0xfe00_707f, 0x0200_7033, "remu",   MulDiv, R, exec::mul::remu),

    // OP (base register-register; after all funct7-specific rows above).
    pat!(0xfe00_707f, 0x0000_0033, "add",  Alu, R, exec::rv32i::add),
    pat!(0xfe00_707f, 0x4000_0033, "sub",  Alu, R, exec::rv32i::sub),
    pat!(0xfe00_707f, 0x0000_1033, "sll",  Alu, R, exec::rv32i::sll),
    pat!(0xfe00_707f, 0x0000_2033, "slt",  Alu, R, exec::rv32i::slt),
    pat!(0xfe00_707f, 0x0000_3033, "sltu", Alu, R, exec::rv32i::sltu),
    pat!(0xfe00_707f, 0x0000_4033, "xor",  Alu, R, exec::rv32i::xor),
    pat!(0xfe00_707f, 0x0000_5033, "srl",  Alu, R, exec::rv32i::srl),
    pat!(0xfe00_707f, 0x4000_5033, "sra",  Alu, R, exec::rv32i::sra),
    pat!(0xfe00_707f, 0x0000_6033, "or",   Alu, R, exec::rv32i::or),
    pat!(0xfe00_707f, 0x0000_7033, "and",  Alu, R, exec::rv32i::and),

    // A extension (aq/rl bits are wildcarded).
    pat!(0xf9f0_707f, 0x1000_202f, "lr.w",      Atomic, R, exec::amo::lr_w),
    pat!(0xf800_707f, 0x1800_202f, "sc.w",      Atomic, R, exec::amo::sc_w),
    pat!(0xf800_707f, 0x0800_202f, "amoswap.w", Atomic, R, exec::amo::amoswap_w),
    pat!(0xf800_707f, 0x0000_202f, "amoadd.w",  Atomic, R, exec::amo::amoadd_w),
    pat!(0xf800_707f, 0x2000_202f, "amoxor.w",  Atomic, R, exec::amo::amoxor_w),
    pat!(0xf800_707f, 0x6000_202f, "amoand.w",  Atomic, R, exec::amo::amoand_w),
    pat!(0xf800_707f, 0x4000_202f, "amoor.w",   Atomic, R, exec::amo::amoor_w),
    pat!(0xf800_707f, 0x8000_202f, "amomin.w",  Atomic, R, exec::amo::amomin_w),
    pat!(0xf800_707f, 0xa000_202f, "amomax.w",  Atomic, R, exec::amo::amomax_w),
    pat!(0xf800_707f, 0xc000_202f, "amominu.w", Atomic, R, exec::amo::amominu_w),
    pat!(0xf800_707f, 0xe000_202f, "amomaxu.w", Atomic, R, exec::amo::amomaxu_w),

    // F/D loads and stores.
    pat!(0x0000_707f, 0x0000_2007, "flw", Float, FpLoad,  exec::fp::flw),
    pat!(0x0000_707f, 0x0000_3007, "fld", Float, FpLoad,  exec::fp::fld),
    pat!(0x0000_707f, 0x0000_2027, "fsw", Float, FpStore, exec::fp::fsw),
    pat!(0x0000_707f, 0x0000_3027, "fsd", Float, FpStore, exec::fp::fsd),

    // F (single precision).
    pat!(0xfe00_007f, 0x0000_0053, "fadd.s",   Float, FpR,  exec::fp::fadd_s),
    pat!(0xfe00_007f, 0x0800_0053, "fsub.s",   Float, FpR,  exec::fp::fsub_s),
    pat!(0xfe00_007f, 0x1000_0053, "fmul.s",   Float, FpR,  exec::fp::fmul_s),
    pat!(0xfe00_007f, 0x1800_0053, "fdiv.s",   Float, FpR,  exec::fp::fdiv_s),
    pat!(0xfff0_007f, 0x5800_0053, "fsqrt.s",  Float, FpF,  exec::fp::fsqrt_s),
    pat!(0xfe00_707f, 0x2000_0053, "fsgnj.s",  Float, FpR,  exec::fp::fsgnj_s),
    pat!(0xfe00_707f, 0x2000_1053, "fsgnjn.s", Float, FpR,  exec::fp::fsgnjn_s),
    pat!(0xfe00_707f, 0x2000_2053, "fsgnjx.s", Float, FpR,  exec::fp::fsgnjx_s),
    pat!(0xfe00_707f, 0x2800_0053, "fmin.s",   Float, FpR,  exec::fp::fmin_s),
    pat!(0xfe00_707f, 0x2800_1053, "fmax.s",   Float, FpR,  exec::fp::fmax_s),
    pat!(0xfff0_007f, 0xc000_0053, "fcvt.w.s", Float, FpXF, exec::fp::fcvt_w_s),
    pat!(0xfff0_007f, 0xc010_0053, "fcvt.wu.s", Float, FpXF, exec::fp::fcvt_wu_s),
    pat!(0xfff0_707f, 0xe000_0053, "fmv.x.w",  Float, FpXF, exec::fp::fmv_x_w),
    pat!(0xfff0_707f, 0xe000_1053, "fclass.s", Float, FpXF, exec::fp::fclass_s),
    pat!(0xfe00_707f, 0xa000_2053, "feq.s",    Float, FpCmp, exec::fp::feq_s),
    pat!(0xfe00_707f, 0xa000_1053, "flt.s",    Float, FpCmp, exec::fp::flt_s),
    pat!(0xfe00_707f, 0xa000_0053, "fle.s",    Float, FpCmp, exec::fp::fle_s),
    pat!(0xfff0_007f, 0xd000_0053, "fcvt.s.w", Float, FpFX, exec::fp::fcvt_s_w),
    pat!(0xfff0_007f, 0xd010_0053, "fcvt.s.wu", Float, FpFX, exec::fp::fcvt_s_wu),
    pat!(0xfff0_707f, 0xf000_0053, "fmv.w.x",  Float, FpFX, exec::fp::fmv_w_x),
    pat!(0x0600_007f, 0x0000_0043, "fmadd.s",  Float, FpR3, exec::fp::fmadd_s),
    pat!(0x0600_007f, 0x0000_0047, "fmsub.s",  Float, FpR3, exec::fp::fmsub_s),
    pat!(0x0600_007f, 0x0000_004b, "fnmsub.s", Float, FpR3, exec::fp::fnmsub_s),
    pat!(0x0600_007f, 0x0000_004f, "fnmadd.s", Float, FpR3, exec::fp::fnmadd_s),

    // D (double precision).
    pat!(0xfe00_007f, 0x0200_0053, "fadd.d",   Float, FpR,  exec::fp::fadd_d),
    pat!(0xfe00_007f, 0x0a00_0053, "fsub.d",   Float, FpR,  exec::fp::fsub_d),
    pat!(0xfe00_007f, 0x1200_0053, "fmul.d",   Float, FpR,  exec::fp::fmul_d),
    pat!(0xfe00_007f, 0x1a00_0053, "fdiv.d",   Float, FpR,  exec::fp::fdiv_d),
    pat!(0xfff0_007f, 0x5a00_0053, "fsqrt.d",  Float, FpF,  exec::fp::fsqrt_d),
    pat!(0xfe00_707f, 0x2200_0053, "fsgnj.d",  Float, FpR,  exec::fp::fsgnj_d),
    pat!(0xfe00_707f, 0x2200_1053, "fsgnjn.d", Float, FpR,  exec::fp::fsgnjn_d),
    pat!(0xfe00_707f, 0x2200_2053, "fsgnjx.d", Float, FpR,  exec::fp::fsgnjx_d),
    pat!(0xfe00_707f, 0x2a00_0053, "fmin.d",   Float, FpR,  exec::fp::fmin_d),
    pat!(0xfe00_707f, 0x2a00_1053, "fmax.d",   Float, FpR,  exec::fp::fmax_d),
    pat!(0xfff0_007f, 0x4010_0053, "fcvt.s.d", Float, FpF,  exec::fp::fcvt_s_d),
    pat!(0xfff0_007f, 0x4200_0053, "fcvt.d.s", Float, FpF,  exec::fp::fcvt_d_s),
    pat!(0xfe00_707f, 0xa200_2053, "feq.d",    Float, FpCmp, exec::fp::feq_d),
    pat!(0xfe00_707f, 0xa200_1053, "flt.d",    Float, FpCmp, exec::fp::flt_d),
    pat!(0xfe00_707f, 0xa200_0053, "fle.d",    Float, FpCmp, exec::fp::fle_d),
    pat!(0xfff0_707f, 0xe200_1053, "fclass.d", Float, FpXF, exec::fp::fclass_d),
    pat!(0xfff0_007f, 0xc200_0053, "fcvt.w.d", Float, FpXF, exec::fp::fcvt_w_d),
    pat!(0xfff0_007f, 0xc210_0053, "fcvt.wu.d", Float, FpXF, exec::fp::fcvt_wu_d),
    pat!(0xfff0_007f, 0xd200_0053, "fcvt.d.w", Float, FpFX, exec::fp::fcvt_d_w),
    pat!(0xfff0_007f, 0xd210_0053, "fcvt.d.wu", Float, FpFX, exec::fp::fcvt_d_wu),
    pat!(0x0600_007f, 0x0200_0043, "fmadd.d",  Float, FpR3, exec::fp::fmadd_d),
    pat!(0x0600_007f, 0x0200_0047, "fmsub.d",  Float, FpR3, exec::fp::fmsub_d),
    pat!(0x0600_007f, 0x0200_004b, "fnmsub.d", Float, FpR3, exec::fp::fnmsub_d),
    pat!(0x0600_007f, 0x0200_004f, "fnmadd.d", Float, FpR3, exec::fp::fnmadd_d),

    // V extension: configuration, unit-stride loads/stores, integer ALU.
    pat!(0x8000_707f, 0x0000_7057, "vsetvli",  Vector, Vsetvli,  exec::vector::vsetvli),
    pat!(0xc000_707f, 0xc000_7057, "vsetivli", Vector, Vsetivli, exec::vector::vsetivli),
    pat!(0xfe00_707f, 0x8000_7057, "vsetvl",   Vector, Vsetvl,   exec::vector::vsetvl),
    pat!(0xfdf0_707f, 0x0000_0007, "vle8.v",  Vector, VLoad,  exec::vector::vle8),
    pat!(0xfdf0_707f, 0x0000_5007, "vle16.v", Vector, VLoad,  exec::vector::vle16),
    pat!(0xfdf0_707f, 0x0000_6007, "vle32.v", Vector, VLoad,  exec::vector::vle32),
    pat!(0xfdf0_707f, 0x0000_0027, "vse8.v",  Vector, VStore, exec::vector::vse8),
    pat!(0xfdf0_707f, 0x0000_5027, "vse16.v", Vector, VStore, exec::vector::vse16),
    pat!(0xfdf0_707f, 0x0000_6027, "vse32.v", Vector, VStore, exec::vector::vse32),
    pat!(0xfc00_707f, 0x0000_0057, "vadd.vv", Vector, VOpIVV, exec::vector::vadd),
    pat!(0xfc00_707f, 0x0000_4057, "vadd.vx", Vector, VOpIVX, exec::vector::vadd),
    pat!(0xfc00_707f, 0x0000_3057, "vadd.vi", Vector, VOpIVI, exec::vector::vadd),
    pat!(0xfc00_707f, 0x0800_0057, "vsub.vv", Vector, VOpIVV, exec::vector::vsub),
    pat!(0xfc00_707f, 0x0800_4057, "vsub.vx", Vector, VOpIVX, exec::vector::vsub),
    pat!(0xfc00_707f, 0x2400_0057, "vand.vv", Vector, VOpIVV, exec::vector::vand),
    pat!(0xfc00_707f, 0x2400_4057, "vand.vx", Vector, VOpIVX, exec::vector::vand),
    pat!(0xfc00_707f, 0x2400_3057, "vand.vi", Vector, VOpIVI, exec::vector::vand),
    pat!(0xfc00_707f, 0x2800_0057, "vor.vv",  Vector, VOpIVV, exec::vector::vor),
    pat!(0xfc00_707f, 0x2800_4057, "vor.vx",  Vector, VOpIVX, exec::vector::vor),
    pat!(0xfc00_707f, 0x2800_3057, "vor.vi",  Vector, VOpIVI, exec::vector::vor),
    pat!(0xfc00_707f, 0x2c00_0057, "vxor.vv", Vector, VOpIVV, exec::vector::vxor),
    pat!(0xfc00_707f, 0x2c00_4057, "vxor.vx", Vector, VOpIVX, exec::vector::vxor),
    pat!(0xfc00_707f, 0x2c00_3057, "vxor.vi", Vector, VOpIVI, exec::vector::vxor),
];

/// Build the IllegalInstruction placeholder for an unrecognized encoding.
fn illegal(raw: u32, width: u32) -> Instruction {
    Instruction {
        mnemonic: "illegal",
        class: InstClass::System,
        srcs: [Operand::None; 3],
        dst: Operand::None,
        semantic: exec::illegal,
        width,
        raw,
    }
}

/// Decode a full 32-bit encoding.
pub fn decode32(raw: u32) -> Instruction {
    for pattern in TABLE {
        if raw & pattern.mask == pattern.bits {
            let (srcs, dst) = pattern.format.bind(raw);
            return Instruction {
                mnemonic: pattern.mnemonic,
                class: pattern.class,
                srcs,
                dst,
                semantic: pattern.semantic,
                width: 4,
                raw,
            };
        }
    }
    log::debug!("no decode pattern for {raw:#010x}");
    illegal(raw, 4)
}

/// Decode the instruction at `pc`, fetching parcels through the state.
///
/// Compressed encodings are expanded before semantic binding; the expected
/// width records the original 2 bytes. An unrecognized encoding yields the
/// IllegalInstruction semantic rather than an error.
pub fn decode_at(state: &mut ArchState, pc: u32) -> Instruction {
    let lo = state.fetch16(pc);
    if lo & 3 == 3 {
        let hi = state.fetch16(pc.wrapping_add(2));
        decode32((hi as u32) << 16 | lo as u32)
    } else {
        match rvc::expand(lo) {
            Some(raw) => Instruction {
                width: 2,
                ..decode32(raw)
            },
            None => illegal(lo as u32, 2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm;
    use crate::inst::Operand;

    #[test]
    fn r_type_binding() {
        // add x2, x1, x1
        let inst = decode32(asm::add(2, 1, 1));
        assert_eq!(inst.mnemonic, "add");
        assert_eq!(inst.srcs[0], Operand::X(1));
        assert_eq!(inst.srcs[1], Operand::X(1));
        assert_eq!(inst.dst, Operand::X(2));
        assert_eq!(inst.width, 4);
    }

    #[test]
    fn i_type_sign_extension() {
        let inst = decode32(asm::addi(5, 6, -12));
        assert_eq!(inst.mnemonic, "addi");
        assert_eq!(inst.src_imm(1), -12);
    }

    #[test]
    fn branch_immediate_scrambling() {
        for &offset in &[-4096i64, -2048, -2, 0, 2, 64, 4094] {
            let inst = decode32(asm::beq(3, 4, offset as i32));
            assert_eq!(inst.src_imm(2), offset, "offset {offset}");
        }
    }

    #[test]
    fn jal_immediate_scrambling() {
        for &offset in &[-1048576i64, -2048, -2, 0, 2, 2048, 1048574] {
            let inst = decode32(asm::jal(1, offset as i32));
            assert_eq!(inst.mnemonic, "jal");
            assert_eq!(inst.src_imm(0), offset, "offset {offset}");
        }
    }

    #[test]
    fn store_immediate() {
        let inst = decode32(asm::sw(2, 7, -20));
        assert_eq!(inst.mnemonic, "sw");
        assert_eq!(inst.srcs[0], Operand::X(2));
        assert_eq!(inst.src_imm(1), -20);
        assert_eq!(inst.srcs[2], Operand::X(7));
    }

    #[test]
    fn funct7_distinguishes_bitmanip_from_base() {
        assert_eq!(decode32(asm::add(1, 2, 3)).mnemonic, "add");
        assert_eq!(decode32(asm::sub(1, 2, 3)).mnemonic, "sub");
        assert_eq!(decode32(asm::andn(1, 2, 3)).mnemonic, "andn");
        assert_eq!(decode32(asm::mul(1, 2, 3)).mnemonic, "mul");
        assert_eq!(decode32(asm::sh1add(1, 2, 3)).mnemonic, "sh1add");
        assert_eq!(decode32(asm::clmul(1, 2, 3)).mnemonic, "clmul");
        // Unary Zbb shares OP-IMM funct3 001 with slli.
        assert_eq!(decode32(asm::clz(1, 2)).mnemonic, "clz");
        assert_eq!(decode32(asm::slli(1, 2, 5)).mnemonic, "slli");
        assert_eq!(decode32(asm::rori(1, 2, 5)).mnemonic, "rori");
        assert_eq!(decode32(asm::srai(1, 2, 5)).mnemonic, "srai");
    }

    #[test]
    fn unknown_encoding_is_illegal() {
        let inst = decode32(0xffff_ffff);
        assert_eq!(inst.mnemonic, "illegal");
        // All-zero is also reserved in the base ISA.
        assert_eq!(decode32(0).mnemonic, "illegal");
    }

    #[test]
    fn csr_binding() {
        // csrrw x5, fcsr, x6
        let inst = decode32(asm::csrrw(5, 0x003, 6));
        assert_eq!(inst.mnemonic, "csrrw");
        assert_eq!(inst.srcs[0], Operand::X(6));
        assert_eq!(inst.src_csr(1), 0x003);
        assert_eq!(inst.dst, Operand::X(5));
    }

    #[test]
    fn amo_rows_ignore_aq_rl() {
        let base = asm::amoadd_w(3, 4, 5);
        for aqrl in 0..4u32 {
            let inst = decode32(base | aqrl << 25);
            assert_eq!(inst.mnemonic, "amoadd.w");
        }
    }

    #[test]
    fn vector_rows_decode() {
        // vsetvli x1, x2, e32
        let inst = decode32(asm::vsetvli(1, 2, 0b010_000));
        assert_eq!(inst.mnemonic, "vsetvli");
        assert_eq!(inst.src_imm(1), 0b010_000);
        // vadd.vv v1, v2, v3 (vm=1)
        let inst = decode32(0x0221_80d7);
        assert_eq!(inst.mnemonic, "vadd.vv");
        assert_eq!(inst.srcs[0], Operand::V(2));
        assert_eq!(inst.srcs[1], Operand::V(3));
        assert_eq!(inst.dst, Operand::V(1));
        assert!(inst.vm_field());
    }
}
