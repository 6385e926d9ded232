//! Rule-file loading and query-file evaluation
//!
//! Loading is line-oriented and forgiving: a line that fails to parse, is not
//! valid UTF-8, or whose rule the index rejects, is skipped and reported as a
//! [`LoadDiagnostic`]. The remaining lines still load. Only a failure to read
//! the source itself is an error.
//!
//! Query evaluation is fail-closed: a query line that cannot be parsed or
//! decoded is reported as rejected.

use super::error::{Error, Result};
use super::firewall::{RangeOrder, RuleIndex};
use super::query::{Decision, DecisionReason, QueryRecord};
use super::rule::{FieldMatching, RuleRecord, is_ignorable};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

/// Knobs for building an index from a rule file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    #[serde(default)]
    pub matching: FieldMatching,
    #[serde(default)]
    pub range_order: RangeOrder,
}

/// A rule line that was skipped
#[derive(Debug)]
pub struct LoadDiagnostic {
    /// 1-based
    pub line_number: usize,
    pub line: String,
    pub error: Error,
}

/// Result of loading a rule source
#[derive(Debug)]
pub struct LoadOutcome {
    pub index: RuleIndex,
    /// Number of rules inserted
    pub loaded: usize,
    pub diagnostics: Vec<LoadDiagnostic>,
}

/// Verdict for one query line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryOutcome {
    /// 1-based
    pub line_number: usize,
    pub line: String,
    pub decision: Decision,
}

/// Accumulates an index line by line
struct Loader {
    options: LoadOptions,
    index: RuleIndex,
    loaded: usize,
    diagnostics: Vec<LoadDiagnostic>,
}

impl Loader {
    fn new(options: LoadOptions) -> Self {
        Self {
            options,
            index: RuleIndex::with_range_order(options.range_order),
            loaded: 0,
            diagnostics: Vec::new(),
        }
    }

    fn push(&mut self, line_number: usize, line: &str) {
        if is_ignorable(line) {
            return;
        }

        let index = &mut self.index;
        let inserted = RuleRecord::parse(line, self.options.matching)
            .and_then(|rule| index.insert_rule_unordered(&rule));
        match inserted {
            Ok(()) => self.loaded += 1,
            Err(error) => self.skip(line_number, line.to_string(), error),
        }
    }

    fn push_bytes(&mut self, line_number: usize, raw: &[u8]) {
        match std::str::from_utf8(raw) {
            Ok(line) => self.push(line_number, line),
            Err(e) => self.skip(
                line_number,
                String::from_utf8_lossy(raw).into_owned(),
                Error::malformed(format!("not valid UTF-8: {e}")),
            ),
        }
    }

    fn skip(&mut self, line_number: usize, line: String, error: Error) {
        warn!(line_number, line = %line.trim(), %error, "Skipping rule");
        self.diagnostics.push(LoadDiagnostic {
            line_number,
            line,
            error,
        });
    }

    fn finish(mut self) -> LoadOutcome {
        self.index.order_ranges();
        info!(
            loaded = self.loaded,
            skipped = self.diagnostics.len(),
            range_order = %self.options.range_order,
            "Rule set loaded"
        );
        LoadOutcome {
            index: self.index,
            loaded: self.loaded,
            diagnostics: self.diagnostics,
        }
    }
}

/// Builds an index from rule lines read from `reader`.
///
/// # Errors
///
/// Returns [`Error::Io`] if reading from `reader` fails. Bad rule lines are
/// not errors; they end up in [`LoadOutcome::diagnostics`].
pub fn load_rules<R: BufRead>(reader: R, options: LoadOptions) -> Result<LoadOutcome> {
    let mut loader = Loader::new(options);
    for_each_line(reader, |line_number, raw| loader.push_bytes(line_number, raw))?;
    Ok(loader.finish())
}

/// Calls `f` with the 1-based number and raw bytes of every line, minus the
/// `\n` or `\r\n` terminator. Bytes are not decoded here, so a line that is
/// not UTF-8 reaches `f` instead of failing the whole read.
fn for_each_line<R: BufRead>(mut reader: R, mut f: impl FnMut(usize, &[u8])) -> Result<()> {
    let mut buf = Vec::new();
    let mut line_number = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        line_number += 1;
        let raw = buf.strip_suffix(b"\n").unwrap_or(buf.as_slice());
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        f(line_number, raw);
    }
}

/// Builds an index from in-memory rule text.
pub fn load_rules_from_str(text: &str, options: LoadOptions) -> LoadOutcome {
    let mut loader = Loader::new(options);
    for (i, line) in text.lines().enumerate() {
        loader.push(i + 1, line);
    }
    loader.finish()
}

/// Builds an index from a rule file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened or read.
pub fn load_rules_from_path(path: impl AsRef<Path>, options: LoadOptions) -> Result<LoadOutcome> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Opening rule file");
    let file = File::open(path)?;
    load_rules(BufReader::new(file), options)
}

/// Evaluates one query line against `index`.
pub fn evaluate_query_line(index: &RuleIndex, line: &str) -> Decision {
    match QueryRecord::parse(line) {
        Ok(query) => {
            let decision = index.evaluate(&query);
            if let DecisionReason::NoMatch { key } = &decision.reason {
                debug!(query = %query, key = key.value(), "Address outside every range");
            }
            decision
        }
        Err(error) => {
            warn!(line = %line.trim(), %error, "Rejecting malformed query");
            Decision::reject(DecisionReason::MalformedQuery {
                message: error.to_string(),
            })
        }
    }
}

/// Evaluates every non-blank, non-comment line read from `reader`.
///
/// A line that is not valid UTF-8 is rejected as
/// [`DecisionReason::MalformedQuery`].
///
/// # Errors
///
/// Returns [`Error::Io`] if reading from `reader` fails.
pub fn evaluate_queries<R: BufRead>(index: &RuleIndex, reader: R) -> Result<Vec<QueryOutcome>> {
    let mut outcomes = Vec::new();
    for_each_line(reader, |line_number, raw| {
        let (line, decision) = match std::str::from_utf8(raw) {
            Ok(line) if is_ignorable(line) => return,
            Ok(line) => (line.trim_end().to_string(), evaluate_query_line(index, line)),
            Err(e) => {
                let line = String::from_utf8_lossy(raw).trim_end().to_string();
                warn!(line_number, %line, "Rejecting query that is not valid UTF-8");
                let decision = Decision::reject(DecisionReason::MalformedQuery {
                    message: format!("not valid UTF-8: {e}"),
                });
                (line, decision)
            }
        };
        outcomes.push(QueryOutcome {
            line_number,
            line,
            decision,
        });
    })?;
    Ok(outcomes)
}

/// Evaluates every query in a file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened or read.
pub fn evaluate_queries_from_path(
    index: &RuleIndex,
    path: impl AsRef<Path>,
) -> Result<Vec<QueryOutcome>> {
    let file = File::open(path.as_ref())?;
    evaluate_queries(index, BufReader::new(file))
}
