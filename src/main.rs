use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use structopt::StructOpt;
use tracing::error;
use tracing_subscriber::EnvFilter;

use pgt::{install, parse_rules, Compiler, PgQuoting, Script};

/// Compiles trigger rules into a PostgreSQL installation script.
#[derive(StructOpt)]
#[structopt(name = "pgt")]
struct Opt {
    /// Rule file to compile
    #[structopt(parse(from_os_str))]
    rules: PathBuf,

    /// Write the script here instead of to stdout
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let opt = Opt::from_args();
    let code = std::fs::read_to_string(&opt.rules)
        .with_context(|| format!("Failed to read {}", opt.rules.display()))?;
    let rules = parse_rules(&code)?;

    let quoting = PgQuoting;
    let compiler = Compiler::new(&quoting);
    let mut script = Script::new(&quoting);
    let mut failed = 0;
    for rule in &rules {
        // A bad rule is reported and skipped; the others still compile.
        match compiler.compile(rule) {
            Ok(compilation) => install(&mut script, &compilation)?,
            Err(e) => {
                error!("{}", e);
                failed += 1;
            }
        }
    }

    match &opt.output {
        Some(path) => std::fs::write(path, script.to_sql())
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{}", script.to_sql()),
    }

    if failed > 0 {
        bail!("{} of {} rules failed to compile", failed, rules.len());
    }
    Ok(())
}
