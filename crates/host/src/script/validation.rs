//! Static checks run over script text before it is trusted.
//!
//! The checks are textual and deliberately cheap: comments are removed and
//! string literal contents are blanked first, so prose such as
//! `ctx:fillText("press input.x")` never trips a rule.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IssueCode {
    SelfReference,
    MissingContract,
    InputInDraw,
    ForbiddenApi,
    GlobalMutation,
}

impl IssueCode {
    pub const ALL: [IssueCode; 5] = [
        IssueCode::SelfReference,
        IssueCode::MissingContract,
        IssueCode::InputInDraw,
        IssueCode::ForbiddenApi,
        IssueCode::GlobalMutation,
    ];

    /// Stable identifier, safe to match on in tooling.
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCode::SelfReference => "self-reference",
            IssueCode::MissingContract => "missing-contract",
            IssueCode::InputInDraw => "input-in-draw",
            IssueCode::ForbiddenApi => "forbidden-api",
            IssueCode::GlobalMutation => "global-mutation",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
    pub line: Option<u32>,
}

impl ValidationIssue {
    fn new(code: IssueCode, message: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            code,
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "[{}] line {}: {}", self.code, line, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

struct Rules {
    self_reference: Regex,
    contract_return: Regex,
    contract_keys: [(&'static str, Regex); 3],
    draw_key: Regex,
    input_access: Regex,
    forbidden_library: Regex,
    forbidden_loader: Regex,
    global_table: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| {
        let compile = |pattern: &str| Regex::new(pattern).expect("validation pattern must compile");
        Rules {
            self_reference: compile(r"(?:^|[^.:\w])(self)\s*[.:]"),
            contract_return: compile(r"\breturn\s*\{"),
            contract_keys: [
                ("init", compile(r"\binit\s*=")),
                ("update", compile(r"\bupdate\s*=")),
                ("draw", compile(r"\bdraw\s*=")),
            ],
            draw_key: compile(r"\bdraw\s*="),
            input_access: compile(r"(?:^|[^.:\w])(input)\s*[.\[]"),
            forbidden_library: compile(r"(?:^|[^.:\w])(os|io|debug|package)\s*\."),
            forbidden_loader: compile(r"(?:^|[^.:\w])(require|loadstring|loadfile|dofile|load)\b"),
            global_table: compile(r"(?:^|[^.:\w])(_G)\b"),
        }
    })
}

/// Returns every rule violation in `text`, ordered by rule then position.
pub fn validate_script(text: &str) -> Vec<ValidationIssue> {
    let code = strip_comments_and_strings(text);
    let rules = rules();
    let mut issues = Vec::new();

    if let Some(offset) = first_token(&rules.self_reference, &code, 0) {
        issues.push(ValidationIssue::new(
            IssueCode::SelfReference,
            "`self` is not available to hooks; keep persistent data in `state` or locals",
            Some(line_of(&code, offset)),
        ));
    }

    let missing: Vec<&str> = rules
        .contract_keys
        .iter()
        .filter(|(_, pattern)| !pattern.is_match(&code))
        .map(|(name, _)| *name)
        .collect();
    if !rules.contract_return.is_match(&code) || !missing.is_empty() {
        let mut message =
            "script must return a table with `init`, `update` and `draw` functions".to_string();
        if !missing.is_empty() {
            message.push_str(&format!(" (missing: {})", missing.join(", ")));
        }
        issues.push(ValidationIssue::new(IssueCode::MissingContract, message, None));
    }

    if let Some(draw) = rules.draw_key.find(&code) {
        if let Some(offset) = first_token(&rules.input_access, &code, draw.end()) {
            issues.push(ValidationIssue::new(
                IssueCode::InputInDraw,
                "`input` accessed inside `draw`; move input handling to `update`",
                Some(line_of(&code, offset)),
            ));
        }
    }

    let mut seen = Vec::new();
    for pattern in [&rules.forbidden_library, &rules.forbidden_loader] {
        for captures in pattern.captures_iter(&code) {
            let Some(name) = captures.get(1) else {
                continue;
            };
            if seen.contains(&name.as_str()) {
                continue;
            }
            seen.push(name.as_str());
            issues.push(ValidationIssue::new(
                IssueCode::ForbiddenApi,
                format!("`{}` is not available in the sandbox", name.as_str()),
                Some(line_of(&code, name.start())),
            ));
        }
    }

    if let Some(offset) = first_token(&rules.global_table, &code, 0) {
        issues.push(ValidationIssue::new(
            IssueCode::GlobalMutation,
            "the global table `_G` must not be touched; keep data in `state`",
            Some(line_of(&code, offset)),
        ));
    }

    issues
}

/// Offset of the first match's token group at or after `start`.
fn first_token(pattern: &Regex, code: &str, start: usize) -> Option<usize> {
    pattern
        .captures_at(code, start)
        .and_then(|captures| captures.get(1))
        .map(|token| token.start())
}

fn line_of(code: &str, offset: usize) -> u32 {
    let newlines = code[..offset].bytes().filter(|byte| *byte == b'\n').count();
    u32::try_from(newlines + 1).unwrap_or(u32::MAX)
}

/// Removes `--` and `--[[ ]]` comments and blanks string literal contents.
/// Newlines survive so reported lines match the source.
fn strip_comments_and_strings(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '-' && chars.get(i + 1) == Some(&'-') {
            i += 2;
            if let Some(level) = long_bracket_level(&chars, i) {
                i = skip_long_bracket(&chars, i, level, &mut out, false);
            } else {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            continue;
        }
        if ch == '"' || ch == '\'' {
            out.push(ch);
            i += 1;
            while i < chars.len() && chars[i] != ch && chars[i] != '\n' {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    push_blank(&mut out, chars[i]);
                    i += 1;
                }
                push_blank(&mut out, chars[i]);
                i += 1;
            }
            if i < chars.len() {
                out.push(chars[i]);
                i += 1;
            }
            continue;
        }
        if ch == '[' {
            if let Some(level) = long_bracket_level(&chars, i) {
                i = skip_long_bracket(&chars, i, level, &mut out, true);
                continue;
            }
        }
        out.push(ch);
        i += 1;
    }
    out
}

fn push_blank(out: &mut String, ch: char) {
    out.push(if ch == '\n' { '\n' } else { ' ' });
}

/// `Some(level)` when a long bracket `[`, `=`*level, `[` opens at `start`.
fn long_bracket_level(chars: &[char], start: usize) -> Option<usize> {
    if chars.get(start) != Some(&'[') {
        return None;
    }
    let mut level = 0;
    while chars.get(start + 1 + level) == Some(&'=') {
        level += 1;
    }
    (chars.get(start + 1 + level) == Some(&'[')).then_some(level)
}

/// Skips a long bracket opening at `start`, returning the index after its
/// close (or the end of input). Strings keep their delimiters.
fn skip_long_bracket(
    chars: &[char],
    start: usize,
    level: usize,
    out: &mut String,
    keep_delimiters: bool,
) -> usize {
    let open_len = level + 2;
    if keep_delimiters {
        out.push('"');
    }
    let mut i = start + open_len;
    while i < chars.len() {
        if chars[i] == ']'
            && (1..=level).all(|offset| chars.get(i + offset) == Some(&'='))
            && chars.get(i + level + 1) == Some(&']')
        {
            if keep_delimiters {
                out.push('"');
            }
            return i + level + 2;
        }
        push_blank(out, chars[i]);
        i += 1;
    }
    i
}
