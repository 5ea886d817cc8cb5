//! ELF image loading and stack-pointer initialization.

use std::collections::HashMap;
use std::path::Path;

use goblin::elf::program_header::{PT_GNU_STACK, PT_LOAD};
use goblin::elf::Elf;
use rv32sim_core::ArchState;

/// e_machine for RISC-V.
const EM_RISCV: u16 = 243;

/// The default stack size when neither a flag, a symbol, nor a GNU_STACK
/// header provides one.
pub const DEFAULT_STACK_SIZE: u32 = 32 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not read '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse the executable")]
    Parse(#[source] goblin::error::Error),
    #[error("not a 32-bit RISC-V executable (machine {machine}, 64-bit: {is_64})")]
    WrongArch { machine: u16, is_64: bool },
    #[error("segment at {vaddr:#010x} extends past the end of the file")]
    TruncatedSegment { vaddr: u32 },
}

/// One loaded PT_LOAD segment.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub vaddr: u32,
    pub memsz: u32,
}

/// A loaded program image: entry point, segment layout, symbol table,
/// and the stack-size hints the executable carries.
pub struct LoadedImage {
    pub entry: u32,
    pub segments: Vec<Segment>,
    symbols: HashMap<String, (u32, u32)>,
    pub gnu_stack_size: Option<u32>,
}

impl LoadedImage {
    /// Look up a symbol by name; returns `(address, size)`.
    pub fn get_symbol(&self, name: &str) -> Option<(u32, u32)> {
        self.symbols.get(name).copied()
    }

    /// The stack size from the executable's PT_GNU_STACK header, if
    /// present and nonzero.
    pub fn get_stack_size(&self) -> Option<u32> {
        self.gnu_stack_size
    }
}

/// Load the PT_LOAD segments of `path` into the state's memory and
/// collect the image description.
pub fn load(path: &Path, state: &mut ArchState) -> Result<LoadedImage, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let elf = Elf::parse(&bytes).map_err(LoadError::Parse)?;

    if elf.is_64 || elf.header.e_machine != EM_RISCV {
        return Err(LoadError::WrongArch {
            machine: elf.header.e_machine,
            is_64: elf.is_64,
        });
    }

    let mut gnu_stack_size = None;
    let mut segments = Vec::new();
    for ph in &elf.program_headers {
        match ph.p_type {
            PT_LOAD => {
                let vaddr = ph.p_vaddr as u32;
                let file_range = ph.p_offset as usize..(ph.p_offset + ph.p_filesz) as usize;
                let segment = bytes
                    .get(file_range)
                    .ok_or(LoadError::TruncatedSegment { vaddr })?;
                log::debug!(
                    "loading segment {:#010x}+{:#x} (file size {:#x})",
                    vaddr,
                    ph.p_memsz,
                    ph.p_filesz
                );
                state.mem.store(vaddr, segment);
                // p_memsz beyond p_filesz is BSS; fresh pages already read
                // as zero.
                segments.push(Segment {
                    vaddr,
                    memsz: ph.p_memsz as u32,
                });
            }
            PT_GNU_STACK if ph.p_memsz != 0 => {
                gnu_stack_size = Some(ph.p_memsz as u32);
            }
            _ => {}
        }
    }

    let mut symbols = HashMap::new();
    for sym in &elf.syms {
        if let Some(name) = elf.strtab.get_at(sym.st_name) {
            if !name.is_empty() {
                symbols.insert(name.to_owned(), (sym.st_value as u32, sym.st_size as u32));
            }
        }
    }

    // Stores performed during loading are not program stores; start the
    // run with a clean journal.
    state.mem.drain_journal();

    Ok(LoadedImage {
        entry: elf.header.e_entry as u32,
        segments,
        symbols,
        gnu_stack_size,
    })
}

/// Operator-provided stack overrides.
#[derive(Debug, Default, Clone, Copy)]
pub struct StackConfig {
    pub base_flag: Option<u32>,
    pub size_flag: Option<u32>,
}

/// Resolve the initial stack pointer: `sp = stack_base + stack_size`.
///
/// The base comes from the flag, else the `__stack_end` symbol. The size
/// comes from the flag, else the `__stack_size` symbol's value, else the
/// GNU_STACK segment size, else 32 KiB. Base and size are resolved
/// independently. With no base known at all, the program is left to set
/// up its own stack and `None` is returned.
pub fn resolve_stack(image: &LoadedImage, config: StackConfig) -> Option<u32> {
    let stack_base = config
        .base_flag
        .or_else(|| image.get_symbol("__stack_end").map(|(addr, _)| addr))?;
    let stack_size = config
        .size_flag
        .or_else(|| image.get_symbol("__stack_size").map(|(value, _)| value))
        .or_else(|| image.get_stack_size())
        .unwrap_or(DEFAULT_STACK_SIZE);
    Some(stack_base.wrapping_add(stack_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with(symbols: &[(&str, u32)], gnu_stack: Option<u32>) -> LoadedImage {
        LoadedImage {
            entry: 0x8000_0000,
            segments: Vec::new(),
            symbols: symbols
                .iter()
                .map(|&(name, value)| (name.to_owned(), (value, 4)))
                .collect(),
            gnu_stack_size: gnu_stack,
        }
    }

    #[test]
    fn symbols_provide_base_and_size() {
        let image = image_with(&[("__stack_end", 0x20_0000), ("__stack_size", 0x8000)], None);
        assert_eq!(
            resolve_stack(&image, StackConfig::default()),
            Some(0x20_8000)
        );
    }

    #[test]
    fn flags_win_over_symbols() {
        let image = image_with(&[("__stack_end", 0x20_0000), ("__stack_size", 0x8000)], None);
        let config = StackConfig {
            base_flag: Some(0x40_0000),
            size_flag: Some(0x1000),
        };
        assert_eq!(resolve_stack(&image, config), Some(0x40_1000));
    }

    #[test]
    fn gnu_stack_is_the_fallback_size() {
        let image = image_with(&[("__stack_end", 0x10_0000)], Some(0x2000));
        assert_eq!(
            resolve_stack(&image, StackConfig::default()),
            Some(0x10_2000)
        );
    }

    #[test]
    fn default_size_applies_last() {
        let image = image_with(&[("__stack_end", 0x10_0000)], None);
        assert_eq!(
            resolve_stack(&image, StackConfig::default()),
            Some(0x10_0000 + DEFAULT_STACK_SIZE)
        );
    }

    #[test]
    fn no_base_means_no_stack_setup() {
        // A size alone must not conjure a stack; base and size are
        // independent.
        let image = image_with(&[("__stack_size", 0x8000)], Some(0x2000));
        assert_eq!(resolve_stack(&image, StackConfig::default()), None);
    }
}
