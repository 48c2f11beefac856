//! Maps converter failures onto the stable [`ErrorCategory`] taxonomy.
//!
//! Substring matching on diagnostics is a heuristic. Rules live in
//! [`RULES`], are matched case-insensitively in order, and anything
//! unrecognised lands in [`ErrorCategory::ConversionFailed`] with only the
//! tail of stderr attached.

use crate::converter::ConverterRun;
use crate::error::{ConvertError, ErrorCategory};

/// Number of non-empty stderr lines kept for unrecognised failures.
pub const STDERR_TAIL_LINES: usize = 5;

pub const CORRUPT_INPUT_MESSAGE: &str = "file is corrupted or not a valid audio file";
pub const MISSING_INPUT_MESSAGE: &str = "input file not found, retry upload";
pub const OUTPUT_MISSING_MESSAGE: &str = "output file not created";

struct Rule {
    category: ErrorCategory,
    signatures: &'static [&'static str],
    message: &'static str,
}

static RULES: &[Rule] = &[
    Rule {
        category: ErrorCategory::InvalidInput,
        signatures: &[
            "moov atom not found",
            "invalid data found when processing input",
            "could not find codec parameters",
            "header missing",
            "invalid data",
        ],
        message: CORRUPT_INPUT_MESSAGE,
    },
    Rule {
        category: ErrorCategory::InvalidInput,
        signatures: &["no such file or directory"],
        message: MISSING_INPUT_MESSAGE,
    },
];

/// Category and client-safe message for a failed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: ErrorCategory,
    pub message: String,
}

impl Classification {
    fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self { category, message: message.into() }
    }

    pub fn into_error(self) -> ConvertError {
        match self.category {
            ErrorCategory::Timeout => ConvertError::Timeout(self.message),
            ErrorCategory::InvalidInput => ConvertError::InvalidInput(self.message),
            ErrorCategory::ConversionFailed => ConvertError::ConversionFailed(self.message),
            _ => ConvertError::Internal(self.message),
        }
    }
}

impl From<Classification> for ConvertError {
    fn from(c: Classification) -> Self {
        c.into_error()
    }
}

/// Classify a converter run. `None` means the run succeeded.
pub fn classify(run: &ConverterRun) -> Option<Classification> {
    if run.timed_out {
        return Some(Classification::new(
            ErrorCategory::Timeout,
            format!("conversion timed out after {}s", run.elapsed.as_secs()),
        ));
    }

    match run.exit_code {
        Some(0) if run.output_ready => None,
        Some(0) => Some(Classification::new(ErrorCategory::InternalError, OUTPUT_MISSING_MESSAGE)),
        code => Some(classify_failure(code, &run.stderr)),
    }
}

fn classify_failure(exit_code: Option<i32>, stderr: &str) -> Classification {
    let haystack = stderr.to_ascii_lowercase();
    let matched = RULES
        .iter()
        .find(|rule| rule.signatures.iter().any(|sig| haystack.contains(sig)));

    if let Some(rule) = matched {
        return Classification::new(rule.category, rule.message);
    }

    let tail = stderr_tail(stderr, STDERR_TAIL_LINES);
    let message = if tail.is_empty() {
        match exit_code {
            Some(code) => format!("converter exited with status {code}"),
            None => "converter terminated by signal".to_owned(),
        }
    } else {
        tail
    };
    Classification::new(ErrorCategory::ConversionFailed, message)
}

/// Last `n` non-empty lines, joined with newlines.
pub fn stderr_tail(stderr: &str, n: usize) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
