use schemerd::diagnostic::{Diagnostic, ParseResult};
use schemerd::diagram::DetailLevel;
use schemerd::dialect::Dialect;
use schemerd::model::Database;
use std::env;
use std::fs;
use std::process;
use tracing_subscriber::EnvFilter;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} <input> --from <dialect> --to <dialect> [options]", program);
    eprintln!("       {} diff <left> <right> --from <dialect>", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -f, --from <dialect>  Input dialect: {}", tags(Dialect::parsers()));
    eprintln!("  -t, --to <dialect>    Output dialect: {}", tags(Dialect::generators()));
    eprintln!("  -o, --output <file>   Output file (default: stdout)");
    eprintln!("  -d, --detail <level>  Diagram detail: tables, pk, pk_fk, all (default: all)");
    process::exit(1);
}

fn tags(dialects: impl Iterator<Item = Dialect>) -> String {
    dialects.map(|d| d.as_str()).collect::<Vec<_>>().join(", ")
}

fn fail(message: String) -> ! {
    eprintln!("{}", message);
    process::exit(1);
}

fn dialect(tag: &str) -> Dialect {
    Dialect::from_str(tag).unwrap_or_else(|| fail(format!("Unknown dialect: {}", tag)))
}

fn report(path: &str, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{}:{}", path, diagnostic);
    }
}

/// Reads and parses one file, exiting when nothing could be parsed.
fn load(path: &str, from: Dialect) -> Database {
    let input = fs::read_to_string(path).unwrap_or_else(|e| fail(format!("Failed to read {}: {}", path, e)));
    let result: ParseResult<Database> = schemerd::parse(from, &input);
    report(path, &result.diagnostics);
    result
        .into_value()
        .unwrap_or_else(|| fail(format!("Could not parse {}", path)))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("schemerd");
    if args.len() < 2 {
        usage(program);
    }

    let mut positional: Vec<String> = Vec::new();
    let mut from: Option<Dialect> = None;
    let mut to: Option<Dialect> = None;
    let mut output_path: Option<String> = None;
    let mut detail = DetailLevel::All;

    let mut i = 1;
    while i < args.len() {
        let value = || args.get(i + 1).cloned().unwrap_or_else(|| usage(program));
        match args[i].as_str() {
            "-f" | "--from" => {
                from = Some(dialect(&value()));
                i += 1;
            }
            "-t" | "--to" => {
                to = Some(dialect(&value()));
                i += 1;
            }
            "-o" | "--output" => {
                output_path = Some(value());
                i += 1;
            }
            "-d" | "--detail" => {
                let level = value();
                detail = DetailLevel::from_str(&level)
                    .unwrap_or_else(|| fail(format!("Invalid detail level: {}", level)));
                i += 1;
            }
            "-h" | "--help" => usage(program),
            arg if arg.starts_with('-') => fail(format!("Unknown option: {}", arg)),
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let from = from.unwrap_or_else(|| usage(program));
    let output = match positional.as_slice() {
        [command, left, right] if command == "diff" => {
            let diff = schemerd::diff(&load(left, from), &load(right, from));
            serde_json::to_string_pretty(&diff).unwrap_or_else(|e| fail(e.to_string())) + "\n"
        }
        [input] => {
            let to = to.unwrap_or_else(|| usage(program));
            let db = load(input, from);
            schemerd::generate_with(to, &db, detail).unwrap_or_else(|e| fail(format!("Generation failed: {}", e)))
        }
        _ => usage(program),
    };

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(&path, &output) {
                fail(format!("Failed to write {}: {}", path, e));
            }
        }
        None => print!("{}", output),
    }
}
