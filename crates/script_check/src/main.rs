use std::env;
use std::io;
use std::process::ExitCode;

use script_check::{run, CheckOptions};

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        println!("{}", usage_text());
        return Ok(());
    }

    let mut options = CheckOptions::default();
    let mut paths = Vec::new();
    for arg in args {
        match arg.as_str() {
            "--load" => options.load = true,
            "--quiet" | "-q" => options.quiet = true,
            flag if flag.starts_with("--") => {
                return Err(format!("unknown option '{flag}'\n\n{}", usage_text()));
            }
            _ => paths.push(arg),
        }
    }

    run(&paths, &options, &mut io::stdout())
}

fn usage_text() -> String {
    [
        "script_check - static checks for sandboxed game-logic scripts",
        "",
        "Usage:",
        "  script_check [--load] [--quiet] <script.lua>...",
        "",
        "  --load   also evaluate each script headless and run its init hook",
        "  --quiet  print only failing files",
        "",
        "Exits 1 when any file has issues.",
    ]
    .join("\n")
}
