use anyhow::Context;
use clap::Parser;
use shlibdeps::{read_binary_file, rpath_from_string, write_rpath};
use std::path::PathBuf;

/// Inspect a binary's dependency metadata, or rewrite the run-path of
/// an ELF file in place.
#[derive(Parser)]
#[command(name = "elfrpath", version)]
struct Args {
    /// Binary to inspect or modify
    file: PathBuf,

    /// New run-path, colon-separated ($ORIGIN is kept verbatim).
    /// Must fit in the space of the existing RUNPATH/RPATH string.
    #[arg(long, value_name = "RPATH")]
    set_rpath: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(rpath_string) = &args.set_rpath {
        let rpath = rpath_from_string(rpath_string)
            .with_context(|| format!("cannot parse '{rpath_string}' as a run path"))?;
        write_rpath(&args.file, &rpath)
            .with_context(|| format!("cannot rewrite the run path of {}", args.file.display()))?;
        println!("{}: rpath set to {rpath_string}", args.file.display());
        return Ok(());
    }

    let info = read_binary_file(&args.file)
        .with_context(|| format!("cannot read {}", args.file.display()))?;

    println!("format: {:?}", info.platform.executable_file_format());
    println!("processor: {:?}", info.platform.processor_isa());
    println!(
        "executable or shared library: {}",
        if info.is_executable_or_library { "yes" } else { "no" }
    );
    println!(
        "debug symbols: {}",
        if info.has_debug_symbols { "yes" } else { "no" }
    );
    if let Some(soname) = &info.soname {
        println!("soname: {soname}");
    }
    if !info.rpath.is_empty() {
        println!("rpath:");
        for entry in &info.rpath {
            println!("\t{}", entry.path());
        }
    }
    if !info.needed_libraries.is_empty() {
        println!("needed libraries:");
        for name in &info.needed_libraries {
            println!("\t{name}");
        }
    }

    Ok(())
}
