//! Command-line front end for the static script checks.

use std::fs;
use std::io::Write;

use host::{validate_script, AudioEngine, Fault, HostConfig, LoadSummary, Runtime, ValidationIssue};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Also evaluate each script in a headless sandbox and run its `init`.
    pub load: bool,
    /// Print only failing files.
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    Issue(ValidationIssue),
    Load(String),
}

pub fn check_text(text: &str, opts: &CheckOptions) -> Vec<Finding> {
    let mut findings = validate_script(text)
        .into_iter()
        .map(Finding::Issue)
        .collect::<Vec<_>>();
    if opts.load {
        if let Some(message) = load_headless(text) {
            findings.push(Finding::Load(message));
        }
    }
    findings
}

fn load_headless(text: &str) -> Option<String> {
    let mut runtime = Runtime::new(&HostConfig::default(), AudioEngine::silent());
    match runtime.load_script(text) {
        Ok(LoadSummary::Started {
            init_fault: Some(fault),
            ..
        }) => Some(Fault::from_script_fault(&fault).to_string()),
        Ok(LoadSummary::Started { .. }) => None,
        Ok(LoadSummary::LegacyDocument { .. }) => {
            Some("legacy HTML document, not a logic script".to_string())
        }
        Err(error) => Some(Fault::from_load_error(&error).to_string()),
    }
}

pub fn run<W: Write>(paths: &[String], opts: &CheckOptions, stdout: &mut W) -> Result<(), String> {
    if paths.is_empty() {
        return Err("no script files given".to_string());
    }

    let mut failing_files = 0usize;
    let mut total_findings = 0usize;
    for path in paths {
        let text = fs::read_to_string(path)
            .map_err(|error| format!("failed to read script file '{path}': {error}"))?;
        let findings = check_text(&text, opts);
        if findings.is_empty() {
            if !opts.quiet {
                writeln!(stdout, "{path}: ok").map_err(|error| format!("write output: {error}"))?;
            }
            continue;
        }
        failing_files += 1;
        total_findings += findings.len();
        for finding in &findings {
            let line = match finding {
                Finding::Issue(issue) => format!("{path}: {issue}"),
                Finding::Load(message) => format!("{path}: [load] {message}"),
            };
            writeln!(stdout, "{line}").map_err(|error| format!("write output: {error}"))?;
        }
    }

    if failing_files == 0 {
        Ok(())
    } else {
        Err(format!(
            "{total_findings} issue(s) in {failing_files} of {} file(s)",
            paths.len()
        ))
    }
}
