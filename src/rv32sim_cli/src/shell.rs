//! The interactive debug shell.
//!
//! A line-oriented front end over the core's debug interface; every
//! command maps onto one debug operation. SIGINT while a `run` command is
//! blocked maps to `halt`, returning control to the prompt.

use std::io::{BufRead, Write};

use rv32sim_engine::{Core, DebugError, HaltReason};

const HELP: &str = "\
commands:
  reg <name> [value]    read or write a register (x/f/CSR names or ABI aliases)
  regs                  dump the integer register file
  mem <addr> [count]    hex-dump memory (default 16 bytes)
  write <addr> <word>   store a 32-bit word
  step [n]              execute n instructions (default 1)
  run                   run until the next halt (Ctrl-C to stop)
  break <addr>          set a software breakpoint
  delete <addr>         clear a software breakpoint
  delete all            clear every breakpoint
  counters              print the retirement counters
  help                  this text
  quit                  leave the shell
";

/// Drive the shell until `quit`/EOF. Returns the process exit code
/// derived from the last halt reason.
pub fn run(core: &Core) -> i32 {
    let stdin = std::io::stdin();
    let mut exit_code = 0;
    loop {
        print!("rv32sim> ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        match dispatch(core, &words) {
            Ok(Verdict::Continue) => {}
            Ok(Verdict::Halted(reason)) => {
                println!("{reason}");
                exit_code = super::exit_code_for(reason);
            }
            Ok(Verdict::Quit) => break,
            Err(e) => println!("error: {e}"),
        }
    }
    exit_code
}

enum Verdict {
    Continue,
    Halted(HaltReason),
    Quit,
}

#[derive(Debug, thiserror::Error)]
enum ShellError {
    #[error("usage error (try 'help')")]
    Usage,
    #[error("bad number '{0}'")]
    BadNumber(String),
    #[error(transparent)]
    Debug(#[from] DebugError),
}

fn dispatch(core: &Core, words: &[&str]) -> Result<Verdict, ShellError> {
    match words {
        [] => Ok(Verdict::Continue),
        ["help"] => {
            print!("{HELP}");
            Ok(Verdict::Continue)
        }
        ["quit"] | ["exit"] => Ok(Verdict::Quit),
        ["reg", name] => {
            let value = core.read_register(name)?;
            println!("{name} = {value:#010x}");
            Ok(Verdict::Continue)
        }
        ["reg", name, value] => {
            core.write_register(name, parse_num(value)? as u64)?;
            Ok(Verdict::Continue)
        }
        ["regs"] => {
            for i in 0..32 {
                let name = format!("x{i}");
                let value = core.read_register(&name)?;
                print!("{name:>4} = {value:#010x}");
                if i % 4 == 3 {
                    println!();
                } else {
                    print!("  ");
                }
            }
            println!("  pc = {:#010x}", core.read_register("pc")?);
            Ok(Verdict::Continue)
        }
        ["mem", addr] => dump_memory(core, parse_num(addr)?, 16),
        ["mem", addr, count] => dump_memory(core, parse_num(addr)?, parse_num(count)?),
        ["write", addr, word] => {
            core.write_memory(parse_num(addr)?, &parse_num(word)?.to_le_bytes())?;
            Ok(Verdict::Continue)
        }
        ["step"] => step(core, 1),
        ["step", n] => step(core, parse_num(n)? as u64),
        ["run"] => {
            core.run()?;
            Ok(Verdict::Halted(core.wait()))
        }
        ["break", addr] => {
            core.set_sw_breakpoint(parse_num(addr)?)?;
            Ok(Verdict::Continue)
        }
        ["delete", "all"] => {
            core.clear_all_breakpoints()?;
            Ok(Verdict::Continue)
        }
        ["delete", addr] => {
            core.clear_sw_breakpoint(parse_num(addr)?)?;
            Ok(Verdict::Continue)
        }
        ["counters"] => {
            for (name, value) in core.counters()? {
                println!("{name} = {value}");
            }
            Ok(Verdict::Continue)
        }
        _ => Err(ShellError::Usage),
    }
}

fn step(core: &Core, n: u64) -> Result<Verdict, ShellError> {
    core.step(n)?;
    Ok(Verdict::Halted(core.wait()))
}

fn dump_memory(core: &Core, addr: u32, count: u32) -> Result<Verdict, ShellError> {
    let bytes = core.read_memory(addr, count)?;
    for (row, chunk) in bytes.chunks(16).enumerate() {
        print!("{:#010x}: ", addr + row as u32 * 16);
        for byte in chunk {
            print!("{byte:02x} ");
        }
        println!();
    }
    Ok(Verdict::Continue)
}

fn parse_num(text: &str) -> Result<u32, ShellError> {
    let parsed = if let Some(hex) = text.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else {
        text.parse()
    };
    parsed.map_err(|_| ShellError::BadNumber(text.to_owned()))
}
