//! The `rv32sim` driver: load an image, wire up the core, run or drop
//! into the shell, export counters, and map the halt reason onto the
//! process exit code.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use rv32sim_core::{ArchState, HaltReason, Handled};
use rv32sim_engine::Core;
use rv32sim_semihosting::htif::HtifAddrs;

mod export;
mod loader;
mod shell;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("rv32sim=info"))
        .init();

    match main_inner() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            log::error!("Command failed.\n{e:?}");
            std::process::exit(1);
        }
    }
}

/// RV32 functional simulator
#[derive(Parser)]
struct Opt {
    /// The statically linked RV32 ELF image to simulate
    elf: PathBuf,
    /// Drop into the interactive debug shell instead of running to
    /// completion
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,
    /// Directory to write the counter export into after the run
    #[arg(long = "counters-dir")]
    counters_dir: Option<PathBuf>,
    /// Semihosting backend servicing the program's host requests
    #[arg(
        long = "semihosting",
        value_enum,
        ignore_case = true,
        default_value = "none"
    )]
    semihosting: SemihostingMode,
    /// Override the stack size in bytes (decimal or 0x-prefixed hex)
    #[arg(long = "stack-size", value_parser = parse_num)]
    stack_size: Option<u32>,
    /// Override the stack base address (decimal or 0x-prefixed hex)
    #[arg(long = "stack-base", value_parser = parse_num)]
    stack_base: Option<u32>,
    /// Treat an unhandled `ecall` as clean program termination
    #[arg(long = "exit-on-ecall")]
    exit_on_ecall: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum SemihostingMode {
    None,
    Htif,
    Arm,
}

fn parse_num(text: &str) -> Result<u32, String> {
    let parsed = if let Some(hex) = text.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else {
        text.parse()
    };
    parsed.map_err(|_| format!("'{text}' is not a valid number"))
}

fn main_inner() -> anyhow::Result<i32> {
    let opt = Opt::parse();

    let core = Core::new(ArchState::new());

    // Load the image and initialize the architectural state while the
    // core is idle.
    let setup = core
        .with_state(|state| -> anyhow::Result<()> {
            let image = loader::load(&opt.elf, state)
                .with_context(|| format!("Could not load '{}'.", opt.elf.display()))?;
            state.pc = image.entry;
            log::debug!("entry point {:#010x}", image.entry);

            let stack_config = loader::StackConfig {
                base_flag: opt.stack_base,
                size_flag: opt.stack_size,
            };
            if let Some(sp) = loader::resolve_stack(&image, stack_config) {
                state.write_register("sp", sp as u64).unwrap();
                log::debug!("sp initialized to {sp:#010x}");
            }

            if opt.exit_on_ecall {
                state.on_ecall(Box::new(|view| {
                    view.request_halt(HaltReason::ProgramDone);
                    Handled::Yes
                }));
            }

            match opt.semihosting {
                SemihostingMode::None => {}
                SemihostingMode::Htif => {
                    let addrs = htif_addrs(&image)?;
                    rv32sim_semihosting::htif::install(state, addrs)
                        .context("Could not install the HTIF watcher.")?;
                }
                SemihostingMode::Arm => {
                    rv32sim_semihosting::arm::install(state);
                }
            }
            Ok(())
        })
        .expect("core cannot be running during setup");
    setup?;

    core.attach_sigint();

    let exit_code = if opt.interactive {
        shell::run(&core)
    } else {
        core.run().expect("core is idle");
        let reason = core.wait();
        log::info!("{reason}");
        exit_code_for(reason)
    };

    if let Some(dir) = &opt.counters_dir {
        let counters = core.counters().expect("core is halted after the run");
        let path = export::write_counters(dir, &counters)?;
        log::debug!("counters written to '{}'", path.display());
    }

    Ok(exit_code)
}

fn htif_addrs(image: &loader::LoadedImage) -> anyhow::Result<HtifAddrs> {
    let Some((tohost, _)) = image.get_symbol("tohost") else {
        bail!("HTIF semihosting requires a 'tohost' symbol in the executable.");
    };
    let Some((fromhost, _)) = image.get_symbol("fromhost") else {
        bail!("HTIF semihosting requires a 'fromhost' symbol in the executable.");
    };
    Ok(HtifAddrs {
        tohost,
        fromhost,
        tohost_ready: image.get_symbol("tohost_ready").map(|(addr, _)| addr),
        fromhost_ready: image.get_symbol("fromhost_ready").map(|(addr, _)| addr),
    })
}

/// Map a final halt reason onto the process exit code.
pub(crate) fn exit_code_for(reason: HaltReason) -> i32 {
    match reason {
        HaltReason::ProgramDone | HaltReason::UserHalt | HaltReason::StepComplete => 0,
        HaltReason::Breakpoint(_) => 0,
        HaltReason::SemihostHalt { exit_code } => exit_code as i32,
        HaltReason::FatalTrap(cause) => {
            log::error!("fatal trap: {cause}");
            1
        }
    }
}
