use anyhow::Context;
use clap::Parser;
use shlibdeps::{resolve_dependencies, LibraryStatus, ResolveQuery};
use std::io::Write;
use std::path::PathBuf;

/// Resolve the transitive shared-library dependencies of ELF and PE
/// binaries.
#[derive(Parser)]
#[command(name = "shlibdeps", version)]
struct Args {
    /// Target binaries (executables or shared libraries)
    #[arg(required = true)]
    targets: Vec<PathBuf>,

    /// Directory prefix to search before the system directories
    /// (repeatable; also consulted with lib/, qt5/lib/ or bin/, qt5/bin/
    /// appended)
    #[arg(short = 'p', long = "search-prefix", value_name = "DIR")]
    search_prefixes: Vec<PathBuf>,

    /// Mount point of the Windows tree for system DLL lookup
    /// (PE targets only; default: /)
    #[arg(long, value_name = "DIR")]
    windows_root: Option<PathBuf>,

    /// Compiler installation directory or compiler executable, used to
    /// locate compiler-provided runtime DLLs (PE targets only)
    #[arg(long, value_name = "PATH")]
    compiler_path: Option<PathBuf>,

    /// Extra library name to exclude from redistribution (repeatable)
    #[arg(long = "exclude", value_name = "NAME")]
    excluded_names: Vec<String>,

    /// Glob pattern of library names to exclude (repeatable)
    #[arg(long = "exclude-pattern", value_name = "PATTERN")]
    excluded_patterns: Vec<String>,

    /// Do not apply the built-in OS exclude list
    #[arg(long)]
    no_default_excludes: bool,

    /// Path for output in JSON format
    #[arg(short = 'j', long, value_name = "PATH")]
    output_json_path: Option<PathBuf>,

    /// Verbosity level (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut query = ResolveQuery {
        default_exclusions: !args.no_default_excludes,
        search_prefixes: args.search_prefixes,
        windows_root: args.windows_root,
        compiler_location: args.compiler_path,
        excluded_names: args.excluded_names,
        excluded_patterns: args.excluded_patterns,
        ..ResolveQuery::default()
    };
    for target in &args.targets {
        query
            .add_target(target)
            .with_context(|| format!("cannot use {} as a target", target.display()))?;
    }

    let results = resolve_dependencies(&query).context("dependency resolution failed")?;

    let mut all_solved = true;
    for result in &results {
        let found = result
            .libraries
            .iter()
            .filter(|l| l.status == LibraryStatus::Resolved)
            .count();
        let excluded = result
            .libraries
            .iter()
            .filter(|l| l.status == LibraryStatus::ExcludedFromRedistribution)
            .count();

        if result.is_solved {
            println!(
                "{}: solved ({found} libraries to deploy, {excluded} excluded)",
                result.target.display()
            );
        } else {
            all_solved = false;
            println!("{}: UNSOLVED, missing:", result.target.display());
            for name in result.missing_library_names() {
                println!("\t{name}");
            }
        }

        if args.verbose > 0 {
            for library in &result.libraries {
                let location = match (&library.path, library.status) {
                    (_, LibraryStatus::ExcludedFromRedistribution) => "excluded".to_owned(),
                    (Some(path), _) => path.display().to_string(),
                    (None, _) => "not found".to_owned(),
                };
                println!("\t{} => {location}", library.name);
            }
        }
    }

    if let Some(json_path) = &args.output_json_path {
        let json = serde_json::to_string_pretty(&results).context("error serializing results")?;
        let mut file = fs_err::File::create(json_path)?;
        file.write_all(json.as_bytes())?;
    }

    if !all_solved {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
