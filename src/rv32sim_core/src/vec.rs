//! Vector-extension configuration state: `vtype`, `vl`, `vstart` and the
//! fixed-point CSR bits.

use crate::VLEN;

/// vtype.vill, set when an unsupported configuration is requested.
const VTYPE_VILL: u32 = 1 << 31;

/// Decoded `vtype` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vtype {
    /// Selected element width in bits: 8, 16, or 32.
    pub sew: u32,
    /// Register group multiplier: 1, 2, 4, or 8.
    pub lmul: u32,
    /// Tail-agnostic policy bit.
    pub ta: bool,
    /// Mask-agnostic policy bit.
    pub ma: bool,
}

impl Vtype {
    /// Decode the low `vtype` bits. Returns `None` for reserved or
    /// unsupported encodings (fractional LMUL, SEW > 32), which set
    /// `vill`.
    pub fn decode(raw: u32) -> Option<Self> {
        let lmul = match raw & 0x7 {
            0b000 => 1,
            0b001 => 2,
            0b010 => 4,
            0b011 => 8,
            _ => return None,
        };
        let sew = match (raw >> 3) & 0x7 {
            0b000 => 8,
            0b001 => 16,
            0b010 => 32,
            _ => return None,
        };
        // Reserved upper bits must be zero.
        if raw & !0xff != 0 {
            return None;
        }
        Some(Self {
            sew,
            lmul,
            ta: raw & (1 << 6) != 0,
            ma: raw & (1 << 7) != 0,
        })
    }

    /// The maximum vector length for this configuration.
    pub fn vlmax(&self) -> u32 {
        VLEN / self.sew * self.lmul
    }
}

/// The hart's vector configuration.
pub struct VectorState {
    vtype: u32,
    pub vl: u32,
    pub vstart: u32,
    pub vxsat: bool,
    pub vxrm: u32,
}

impl Default for VectorState {
    fn default() -> Self {
        Self {
            // Reset state is vill with everything else zero.
            vtype: VTYPE_VILL,
            vl: 0,
            vstart: 0,
            vxsat: false,
            vxrm: 0,
        }
    }
}

impl VectorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vtype_raw(&self) -> u32 {
        self.vtype
    }

    pub fn vill(&self) -> bool {
        self.vtype & VTYPE_VILL != 0
    }

    /// The decoded configuration, if legal.
    pub fn vtype(&self) -> Option<Vtype> {
        if self.vill() {
            None
        } else {
            Vtype::decode(self.vtype)
        }
    }

    /// Apply a `vset{i}vl{i}` request: configure `vtype` and derive `vl`
    /// from the application vector length. Returns the new `vl`.
    ///
    /// An unsupported `vtype` sets `vill` and zeroes `vl`, per the
    /// configuration-setting instruction rules.
    pub fn apply_vset(&mut self, avl: u32, vtype_raw: u32) -> u32 {
        match Vtype::decode(vtype_raw) {
            Some(vtype) => {
                self.vtype = vtype_raw;
                self.vl = avl.min(vtype.vlmax());
            }
            None => {
                log::debug!("unsupported vtype {vtype_raw:#010x}; setting vill");
                self.vtype = VTYPE_VILL;
                self.vl = 0;
            }
        }
        self.vstart = 0;
        self.vl
    }

    pub fn read_vcsr(&self) -> u32 {
        (self.vxrm << 1) | self.vxsat as u32
    }

    pub fn write_vcsr(&mut self, value: u32) {
        self.vxsat = value & 1 != 0;
        self.vxrm = (value >> 1) & 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vset_derives_vl_from_vlmax() {
        let mut v = VectorState::new();
        // SEW=32, LMUL=1: VLMAX = 128/32 = 4.
        assert_eq!(v.apply_vset(100, 0b010_000), 4);
        assert_eq!(v.vl, 4);
        assert!(!v.vill());
        // Short request keeps avl.
        assert_eq!(v.apply_vset(3, 0b010_000), 3);
        // SEW=8, LMUL=8: VLMAX = 128.
        assert_eq!(v.apply_vset(1000, 0b000_011), 128);
    }

    #[test]
    fn unsupported_vtype_sets_vill() {
        let mut v = VectorState::new();
        // SEW=64 is not supported on this VLEN=128 RV32 model.
        assert_eq!(v.apply_vset(4, 0b011_000), 0);
        assert!(v.vill());
        assert_eq!(v.vl, 0);
        // Fractional LMUL encodings are reserved here.
        assert_eq!(v.apply_vset(4, 0b000_101), 0);
        assert!(v.vill());
    }

    #[test]
    fn vset_resets_vstart() {
        let mut v = VectorState::new();
        v.vstart = 3;
        v.apply_vset(4, 0b010_000);
        assert_eq!(v.vstart, 0);
    }

    #[test]
    fn vcsr_mirrors_vxrm_and_vxsat() {
        let mut v = VectorState::new();
        v.write_vcsr(0b101);
        assert!(v.vxsat);
        assert_eq!(v.vxrm, 0b10);
        assert_eq!(v.read_vcsr(), 0b101);
    }
}
