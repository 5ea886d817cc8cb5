//! Compressed (RVC) instruction expansion.
//!
//! Every valid 16-bit encoding maps onto exactly one 32-bit instruction;
//! expansion happens before operand binding so the semantics layer never
//! sees compressed forms. RV32 mappings only (C.JAL exists, the RV64-only
//! encodings are reserved).

use crate::asm;

/// The 3-bit register fields address x8..x15 / f8..f15.
fn creg(bits: u16) -> u8 {
    (bits & 7) as u8 + 8
}

fn bit(half: u16, n: u32) -> u32 {
    (half as u32 >> n) & 1
}

fn bits(half: u16, hi: u32, lo: u32) -> u32 {
    (half as u32 >> lo) & ((1 << (hi - lo + 1)) - 1)
}

/// Expand a 16-bit parcel to its 32-bit equivalent. `None` for reserved
/// and illegal encodings (including the defined-illegal all-zero parcel).
pub fn expand(half: u16) -> Option<u32> {
    let funct3 = bits(half, 15, 13);
    let rd_rs1 = bits(half, 11, 7) as u8;
    let rs2 = bits(half, 6, 2) as u8;
    let rd_p = creg(bits(half, 4, 2) as u16);
    let rs1_p = creg(bits(half, 9, 7) as u16);

    Some(match (bits(half, 1, 0), funct3) {
        // C.ADDI4SPN: addi rd', x2, nzuimm
        (0b00, 0b000) => {
            let nzuimm = bits(half, 12, 11) << 4
                | bits(half, 10, 7) << 6
                | bit(half, 6) << 2
                | bit(half, 5) << 3;
            if nzuimm == 0 {
                // Covers the all-zero illegal encoding.
                return None;
            }
            asm::addi(rd_p, 2, nzuimm as i32)
        }
        // C.FLD
        (0b00, 0b001) => {
            let uimm = bits(half, 12, 10) << 3 | bits(half, 6, 5) << 6;
            asm::fld(rd_p, rs1_p, uimm as i32)
        }
        // C.LW
        (0b00, 0b010) => {
            let uimm = bits(half, 12, 10) << 3 | bit(half, 6) << 2 | bit(half, 5) << 6;
            asm::lw(rd_p, rs1_p, uimm as i32)
        }
        // C.FLW (RV32)
        (0b00, 0b011) => {
            let uimm = bits(half, 12, 10) << 3 | bit(half, 6) << 2 | bit(half, 5) << 6;
            asm::flw(rd_p, rs1_p, uimm as i32)
        }
        // C.FSD
        (0b00, 0b101) => {
            let uimm = bits(half, 12, 10) << 3 | bits(half, 6, 5) << 6;
            asm::fsd(rs1_p, rd_p, uimm as i32)
        }
        // C.SW
        (0b00, 0b110) => {
            let uimm = bits(half, 12, 10) << 3 | bit(half, 6) << 2 | bit(half, 5) << 6;
            asm::sw(rs1_p, rd_p, uimm as i32)
        }
        // C.FSW (RV32)
        (0b00, 0b111) => {
            let uimm = bits(half, 12, 10) << 3 | bit(half, 6) << 2 | bit(half, 5) << 6;
            asm::fsw(rs1_p, rd_p, uimm as i32)
        }

        // C.ADDI (C.NOP when rd = 0)
        (0b01, 0b000) => asm::addi(rd_rs1, rd_rs1, imm6(half)),
        // C.JAL (RV32)
        (0b01, 0b001) => asm::jal(1, cj_offset(half)),
        // C.LI
        (0b01, 0b010) => asm::addi(rd_rs1, 0, imm6(half)),
        (0b01, 0b011) => {
            if rd_rs1 == 2 {
                // C.ADDI16SP
                let imm = (sext(
                    bit(half, 12) << 9
                        | bit(half, 6) << 4
                        | bit(half, 5) << 6
                        | bits(half, 4, 3) << 7
                        | bit(half, 2) << 5,
                    10,
                )) as i32;
                if imm == 0 {
                    return None;
                }
                asm::addi(2, 2, imm)
            } else {
                // C.LUI
                let imm = sext(bit(half, 12) << 5 | bits(half, 6, 2), 6);
                if imm == 0 {
                    return None;
                }
                asm::lui(rd_rs1, imm as u32)
            }
        }
        (0b01, 0b100) => {
            let shamt = bits(half, 6, 2) as u8;
            match bits(half, 11, 10) {
                // C.SRLI / C.SRAI (shamt[5] must be zero on RV32)
                0b00 if bit(half, 12) == 0 => asm::srli(rs1_p, rs1_p, shamt),
                0b01 if bit(half, 12) == 0 => asm::srai(rs1_p, rs1_p, shamt),
                // C.ANDI
                0b10 => asm::andi(rs1_p, rs1_p, imm6(half)),
                0b11 if bit(half, 12) == 0 => match bits(half, 6, 5) {
                    0b00 => asm::sub(rs1_p, rs1_p, rd_p),
                    0b01 => asm::xor(rs1_p, rs1_p, rd_p),
                    0b10 => asm::or(rs1_p, rs1_p, rd_p),
                    0b11 => asm::and(rs1_p, rs1_p, rd_p),
                    _ => unreachable!(),
                },
                _ => return None,
            }
        }
        // C.J
        (0b01, 0b101) => asm::jal(0, cj_offset(half)),
        // C.BEQZ / C.BNEZ
        (0b01, 0b110) => asm::beq(rs1_p, 0, cb_offset(half)),
        (0b01, 0b111) => asm::bne(rs1_p, 0, cb_offset(half)),

        // C.SLLI (shamt[5] must be zero on RV32)
        (0b10, 0b000) if bit(half, 12) == 0 => asm::slli(rd_rs1, rd_rs1, rs2 & 0x1f),
        // C.FLDSP
        (0b10, 0b001) => {
            let uimm = bit(half, 12) << 5 | bits(half, 6, 5) << 3 | bits(half, 4, 2) << 6;
            asm::fld(rd_rs1, 2, uimm as i32)
        }
        // C.LWSP
        (0b10, 0b010) => {
            if rd_rs1 == 0 {
                return None;
            }
            let uimm = bit(half, 12) << 5 | bits(half, 6, 4) << 2 | bits(half, 3, 2) << 6;
            asm::lw(rd_rs1, 2, uimm as i32)
        }
        // C.FLWSP (RV32)
        (0b10, 0b011) => {
            let uimm = bit(half, 12) << 5 | bits(half, 6, 4) << 2 | bits(half, 3, 2) << 6;
            asm::flw(rd_rs1, 2, uimm as i32)
        }
        (0b10, 0b100) => match (bit(half, 12), rd_rs1, rs2) {
            // C.JR (rs1 = 0 is reserved)
            (0, 0, 0) => return None,
            (0, rs1, 0) => asm::jalr(0, rs1, 0),
            // C.MV
            (0, rd, rs2) => asm::add(rd, 0, rs2),
            // C.EBREAK
            (1, 0, 0) => asm::ebreak(),
            // C.JALR
            (1, rs1, 0) => asm::jalr(1, rs1, 0),
            // C.ADD
            (1, rd, rs2) => asm::add(rd, rd, rs2),
            _ => unreachable!(),
        },
        // C.FSDSP
        (0b10, 0b101) => {
            let uimm = bits(half, 12, 10) << 3 | bits(half, 9, 7) << 6;
            asm::fsd(2, rs2, uimm as i32)
        }
        // C.SWSP
        (0b10, 0b110) => {
            let uimm = bits(half, 12, 9) << 2 | bits(half, 8, 7) << 6;
            asm::sw(2, rs2, uimm as i32)
        }
        // C.FSWSP (RV32)
        (0b10, 0b111) => {
            let uimm = bits(half, 12, 9) << 2 | bits(half, 8, 7) << 6;
            asm::fsw(2, rs2, uimm as i32)
        }

        _ => return None,
    })
}

/// Sign-extend the low `width` bits.
fn sext(value: u32, width: u32) -> i32 {
    let shift = 32 - width;
    (value << shift) as i32 >> shift
}

/// The 6-bit immediate of C.ADDI/C.LI/C.ANDI.
fn imm6(half: u16) -> i32 {
    sext(bit(half, 12) << 5 | bits(half, 6, 2), 6)
}

/// The 12-bit jump offset of C.J/C.JAL.
fn cj_offset(half: u16) -> i32 {
    sext(
        bit(half, 12) << 11
            | bit(half, 11) << 4
            | bits(half, 10, 9) << 8
            | bit(half, 8) << 10
            | bit(half, 7) << 6
            | bit(half, 6) << 7
            | bits(half, 5, 3) << 1
            | bit(half, 2) << 5,
        12,
    )
}

/// The 9-bit branch offset of C.BEQZ/C.BNEZ.
fn cb_offset(half: u16) -> i32 {
    sext(
        bit(half, 12) << 8
            | bits(half, 11, 10) << 3
            | bits(half, 6, 5) << 6
            | bits(half, 4, 3) << 1
            | bit(half, 2) << 5,
        9,
    )
}
