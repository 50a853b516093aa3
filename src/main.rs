use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser as ClapParser;

use jazz::error::JazzError;
use jazz::interpreter::Interpreter;

#[derive(ClapParser, Debug)]
#[command(version, about = "Tree-walking interpreter for the Jazz language", long_about = None)]
struct Cli {
    /// A script file, or a directory whose *.jz files are run in order.
    #[arg(short, long)]
    file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = Cli::parse();

    match args.file {
        Some(path) => {
            let metadata = fs::metadata(&path)
                .with_context(|| format!("could not read {}", path.display()))?;

            if metadata.is_dir() {
                run_dir(&path)
            } else {
                run_file(&path)
            }
        }

        None => repl(),
    }
}

fn run_file(path: &Path) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;

    let mut interpreter = Interpreter::new();

    if let Err(errors) = jazz::run(&mut interpreter, &source) {
        let code = exit_code(&errors);

        for e in &errors {
            eprintln!("{}", e);
        }

        std::process::exit(code);
    }

    Ok(())
}

fn run_dir(dir: &Path) -> anyhow::Result<()> {
    let mut scripts: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("could not read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "jz"))
        .collect();

    scripts.sort();

    for script in &scripts {
        run_file(script)?;
    }

    Ok(())
}

fn repl() -> anyhow::Result<()> {
    // One interpreter for the whole session, so definitions accumulate.
    let mut interpreter = Interpreter::new().with_repl();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("Welcome to Jazz {}", env!("CARGO_PKG_VERSION"));

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let line = line.trim_end_matches(['\n', '\r']);
        if line == ".exit" {
            break;
        }

        // Every error is chunk-fatal but the REPL loops on.
        if let Err(errors) = jazz::run(&mut interpreter, line) {
            for e in &errors {
                eprintln!("{}", e);
            }
        }
    }

    Ok(())
}

fn exit_code(errors: &[JazzError]) -> i32 {
    if errors
        .iter()
        .any(|e| matches!(e, JazzError::Runtime { .. } | JazzError::Io(_)))
    {
        70
    } else {
        65
    }
}
