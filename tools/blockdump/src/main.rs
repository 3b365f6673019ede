//! dynarec-blockdump: translate a raw 32-bit x86 image and report
//! the units built from it.
//!
//! Starting from the entry addresses, every unit is translated, and
//! the exits recorded in its jump table are followed while they stay
//! inside the image.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::process;

use dynarec_backend::Aarch64Emitter;
use dynarec_core::jump_table::SLOT_TARGET;
use dynarec_exec::{Dynarec, DynarecConfig, TranslationUnit, UnitState};
use dynarec_frontend::FlatMemory;
use tracing_subscriber::EnvFilter;

struct Args {
    image_path: String,
    base: u64,
    entries: Vec<u64>,
    output: Option<String>,
    count: usize,
    standalone: bool,
    dump: Option<u8>,
    max_insns: Option<usize>,
}

const USAGE: &str = "\
usage: dynarec-blockdump <image> [options]

Options:
  --base <hex>       Load address of the image (default: 0x1000)
  --entry <hex>      Entry address, repeatable (default: base)
  -o <file>          Output to file
  --count <n>        Max units to translate (default: 256)
  --standalone       Build standalone units (no jump tables)
  --dump <n>         Trace level 0-2 (default: DYNAREC_DUMP)
  --max-insns <n>    Max insns per unit
  -h, --help         Show this help

Logging is controlled by RUST_LOG (e.g. RUST_LOG=dynarec::dump=info).";

fn parse_hex(s: &str) -> u64 {
    let s = s.trim_start_matches("0x");
    u64::from_str_radix(s, 16).unwrap_or_else(|_| {
        eprintln!("invalid hex address: {s}");
        process::exit(1);
    })
}

fn parse_args() -> Args {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        eprintln!("{USAGE}");
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let mut a = Args {
        image_path: args[1].clone(),
        base: 0x1000,
        entries: Vec::new(),
        output: None,
        count: 256,
        standalone: false,
        dump: None,
        max_insns: None,
    };

    let mut i = 2;
    let value = |i: &mut usize| -> String {
        *i += 1;
        args.get(*i).cloned().unwrap_or_else(|| {
            eprintln!("missing value for {}", args[*i - 1]);
            process::exit(1);
        })
    };
    while i < args.len() {
        match args[i].as_str() {
            "--base" => a.base = parse_hex(&value(&mut i)),
            "--entry" => a.entries.push(parse_hex(&value(&mut i))),
            "-o" => a.output = Some(value(&mut i)),
            "--count" => {
                a.count = value(&mut i).parse().unwrap_or_else(|_| {
                    eprintln!("invalid count");
                    process::exit(1);
                })
            }
            "--standalone" => a.standalone = true,
            "--dump" => {
                a.dump = Some(value(&mut i).parse().unwrap_or_else(|_| {
                    eprintln!("invalid dump level");
                    process::exit(1);
                }))
            }
            "--max-insns" => {
                a.max_insns = Some(value(&mut i).parse().unwrap_or_else(|_| {
                    eprintln!("invalid max-insns");
                    process::exit(1);
                }))
            }
            other => {
                eprintln!("unknown option: {other}");
                process::exit(1);
            }
        }
        i += 1;
    }
    if a.entries.is_empty() {
        a.entries.push(a.base);
    }
    a
}

fn state_name(state: UnitState) -> &'static str {
    match state {
        UnitState::Pending => "pending",
        UnitState::Building => "building",
        UnitState::Empty => "empty",
        UnitState::Failed => "failed",
        UnitState::Ready => "ready",
        UnitState::Retired => "retired",
    }
}

fn report(unit: &TranslationUnit, w: &mut impl Write) -> io::Result<()> {
    let state = state_name(unit.state());
    let Some(body) = unit.body() else {
        return writeln!(w, "{:#010x}  {state}", unit.entry());
    };
    writeln!(
        w,
        "{:#010x}  {state}  x86={:#x}+{:<5} insns={:<4} host={:<6} predicted={:<6} exits={:<3} sons={}",
        unit.entry(),
        body.x86_addr,
        body.x86_size,
        body.insn_count,
        body.code.len(),
        body.predicted_size,
        body.jump_table.as_ref().map_or(0, |t| t.records()),
        body.sons.len(),
    )?;
    for son in &body.sons {
        if let Some(sb) = son.body() {
            writeln!(
                w,
                "  son {:#010x}  x86 size={:<5} host+{:#x}",
                son.entry(),
                sb.x86_size,
                sb.code.addr() - body.code.addr()
            )?;
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = parse_args();

    let image = fs::read(&args.image_path).unwrap_or_else(|e| {
        eprintln!("cannot read {}: {e}", args.image_path);
        process::exit(1);
    });
    let mem = FlatMemory::new(args.base, image);

    let mut config = DynarecConfig::from_env().unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });
    if args.standalone {
        config = config.with_linker(false);
    }
    if let Some(dump) = args.dump {
        config = config.with_dump(dump);
    }
    if let Some(n) = args.max_insns {
        config = config.with_max_insns(n);
    }
    let dynarec = Dynarec::new(Aarch64Emitter::new(), config);

    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(fs::File::create(path).unwrap_or_else(|e| {
            eprintln!("cannot create {path}: {e}");
            process::exit(1);
        })),
        None => Box::new(io::stdout()),
    };
    let mut w = BufWriter::new(out);

    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<u64> = args.entries.iter().copied().collect();
    let mut built = 0;
    while let Some(addr) = queue.pop_front() {
        if built >= args.count {
            break;
        }
        if !seen.insert(addr) {
            continue;
        }
        tracing::debug!("translating {addr:#x}");
        let unit = dynarec.lookup_or_build(&mem, addr);
        built += 1;
        if let Err(e) = report(&unit, &mut w) {
            eprintln!("write error: {e}");
            process::exit(1);
        }

        let Some(table) = unit.body().and_then(|b| b.jump_table.clone()) else {
            continue;
        };
        for idx in 0..table.records() {
            let target = table.get(idx, SLOT_TARGET);
            if target >= mem.base() && target < mem.end() && !seen.contains(&target) {
                queue.push_back(target);
            }
        }
    }

    if let Err(e) = writeln!(w, "{built} units, {} registered", dynarec.registry.len())
        .and_then(|_| w.flush())
    {
        eprintln!("write error: {e}");
        process::exit(1);
    }
}
