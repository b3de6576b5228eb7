use std::fmt;

use tracing::{info, warn};

use crate::script::{Hook, LoadError, ScriptFault, ValidationIssue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Syntax,
    Init,
    Runtime,
    Validation,
    /// Not an error: the script was a legacy document the native host
    /// cannot display.
    Notice,
}

impl FaultKind {
    pub fn label(self) -> &'static str {
        match self {
            FaultKind::Syntax => "SYNTAX ERROR",
            FaultKind::Init => "INIT ERROR",
            FaultKind::Runtime => "RUNTIME ERROR",
            FaultKind::Validation => "VALIDATION ERROR",
            FaultKind::Notice => "NOTICE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    pub line: Option<u32>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
        }
    }

    /// Every load failure is shown as a syntax-class error, the way the
    /// loader's last-chance evaluation surfaces it.
    pub fn from_load_error(error: &LoadError) -> Self {
        Self::new(FaultKind::Syntax, error.to_string(), error.line())
    }

    pub fn from_script_fault(fault: &ScriptFault) -> Self {
        let kind = match fault.hook {
            Hook::Init => FaultKind::Init,
            Hook::Update | Hook::Draw => FaultKind::Runtime,
        };
        Self::new(kind, fault.message.clone(), fault.line)
    }

    pub fn from_validation(issues: &[ValidationIssue]) -> Self {
        let message = issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        let line = issues.iter().find_map(|issue| issue.line);
        Self::new(FaultKind::Validation, message, line)
    }

    pub fn is_error(&self) -> bool {
        self.kind != FaultKind::Notice
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)?;
        if let Some(line) = self.line {
            write!(f, " (Line {line})")?;
        }
        Ok(())
    }
}

/// Single-slot fault display: the newest report replaces the previous one.
#[derive(Debug, Default)]
pub struct Diagnostics {
    current: Option<Fault>,
    reports: u64,
}

impl Diagnostics {
    pub fn report(&mut self, fault: Fault) {
        self.reports = self.reports.saturating_add(1);
        if fault.is_error() {
            warn!(
                kind = fault.kind.label(),
                line = fault.line,
                message = %fault.message,
                "script_fault_reported"
            );
        } else {
            info!(message = %fault.message, "script_notice_reported");
        }
        self.current = Some(fault);
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&Fault> {
        self.current.as_ref()
    }

    /// Rendered text of the current fault, as the overlay shows it.
    pub fn rendered(&self) -> Option<String> {
        self.current.as_ref().map(ToString::to_string)
    }

    /// Total reports since creation, including ones since replaced.
    pub fn report_count(&self) -> u64 {
        self.reports
    }
}
