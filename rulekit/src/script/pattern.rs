//! `#inspect-script`: a line-oriented inspection script language.
//!
//! ```text
//! #inspect-script
//! # allow-list first, the first directive that hits decides
//! nomatch prefix healthcheck-
//! match rx (?i)union\s+select
//! match contains <script
//! default nomatch
//! ```
//!
//! Directives are `match <test> <argument>` or `nomatch <test> <argument>`,
//! where `<test>` is one of `rx`, `contains`, `equals`, `prefix`, `suffix`.
//! The argument is the rest of the line, trimmed. `default match|nomatch`
//! sets the verdict when no directive hits (no match if omitted). Blank lines
//! and lines starting with `#` are ignored.

use std::path::Path;

use regex::Regex;

use crate::error::ScriptError;
use crate::script::{CompiledScript, ScriptHandle, ScriptRuntime};
use crate::transaction::Transaction;

/// First line every script must start with.
pub const HEADER: &str = "#inspect-script";

const TRACE_LEVEL: u8 = 9;
const BOM: &str = "\u{feff}";

/// Runtime for `#inspect-script` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternScriptRuntime;

impl ScriptRuntime for PatternScriptRuntime {
    fn name(&self) -> &str {
        "inspect-script"
    }

    fn recognizes(&self, _path: &Path, header: &[u8]) -> bool {
        header
            .strip_prefix(BOM.as_bytes())
            .unwrap_or(header)
            .starts_with(HEADER.as_bytes())
    }

    fn compile(&self, _path: &Path, source: &str) -> Result<ScriptHandle, ScriptError> {
        Ok(Box::new(PatternScript::parse(source)?))
    }
}

#[derive(Debug)]
pub struct PatternScript {
    directives: Vec<Directive>,
    default: bool,
}

#[derive(Debug)]
struct Directive {
    line: usize,
    verdict: bool,
    test: Test,
}

#[derive(Debug)]
enum Test {
    Regex(Regex),
    Contains(String),
    Equals(String),
    Prefix(String),
    Suffix(String),
}

impl Test {
    fn parse(line: usize, kind: &str, argument: &str) -> Result<Self, ScriptError> {
        if argument.is_empty() {
            return Err(ScriptError::Syntax {
                line,
                reason: format!("`{kind}` needs an argument"),
            });
        }
        let arg = argument.to_string();
        match kind {
            "rx" => Regex::new(argument)
                .map(Test::Regex)
                .map_err(|source| ScriptError::Pattern { line, source }),
            "contains" => Ok(Test::Contains(arg)),
            "equals" => Ok(Test::Equals(arg)),
            "prefix" => Ok(Test::Prefix(arg)),
            "suffix" => Ok(Test::Suffix(arg)),
            other => Err(ScriptError::Syntax {
                line,
                reason: format!("unknown test `{other}`"),
            }),
        }
    }

    fn hits(&self, value: &str) -> bool {
        match self {
            Test::Regex(re) => re.is_match(value),
            Test::Contains(needle) => value.contains(needle.as_str()),
            Test::Equals(expected) => value == expected,
            Test::Prefix(prefix) => value.starts_with(prefix.as_str()),
            Test::Suffix(suffix) => value.ends_with(suffix.as_str()),
        }
    }
}

impl PatternScript {
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        let mut lines = source.lines().enumerate().map(|(idx, line)| (idx + 1, line));

        match lines.next() {
            Some((_, first)) if first.trim_start_matches(BOM).starts_with(HEADER) => {}
            _ => {
                return Err(ScriptError::Syntax {
                    line: 1,
                    reason: format!("missing `{HEADER}` header"),
                });
            }
        }

        let mut directives = Vec::new();
        let mut default = None;
        let mut last_line = 1;
        for (line, raw) in lines {
            last_line = line;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let (keyword, rest) = split_word(text);
            match keyword {
                "default" => {
                    if default.is_some() {
                        return Err(ScriptError::Syntax {
                            line,
                            reason: "duplicate `default`".to_string(),
                        });
                    }
                    default = Some(parse_verdict(line, rest)?);
                }
                "match" | "nomatch" => {
                    let (kind, argument) = split_word(rest);
                    directives.push(Directive {
                        line,
                        verdict: keyword == "match",
                        test: Test::parse(line, kind, argument)?,
                    });
                }
                other => {
                    return Err(ScriptError::Syntax {
                        line,
                        reason: format!("unknown directive `{other}`"),
                    });
                }
            }
        }

        if directives.is_empty() && default.is_none() {
            return Err(ScriptError::Syntax {
                line: last_line,
                reason: "script has no directives".to_string(),
            });
        }

        Ok(Self {
            directives,
            default: default.unwrap_or(false),
        })
    }

    /// Verdict for `value` and the line of the directive that decided it.
    fn decide(&self, value: &str) -> (bool, Option<usize>) {
        self.directives
            .iter()
            .find(|d| d.test.hits(value))
            .map_or((self.default, None), |d| (d.verdict, Some(d.line)))
    }
}

impl CompiledScript for PatternScript {
    fn run(&self, transaction: &Transaction, value: &str) -> bool {
        let (verdict, line) = self.decide(value);
        if transaction.debug_enabled(TRACE_LEVEL) {
            let outcome = if verdict { "match" } else { "no match" };
            match line {
                Some(line) => transaction.debug(
                    TRACE_LEVEL,
                    format!("Script directive at line {line} decided: {outcome}."),
                ),
                None => transaction.debug(
                    TRACE_LEVEL,
                    format!("No script directive hit, default: {outcome}."),
                ),
            }
        }
        verdict
    }
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

fn parse_verdict(line: usize, word: &str) -> Result<bool, ScriptError> {
    match word {
        "match" => Ok(true),
        "nomatch" => Ok(false),
        other => Err(ScriptError::Syntax {
            line,
            reason: format!("expected `match` or `nomatch`, found `{other}`"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "#inspect-script
# allow-list first
nomatch prefix healthcheck-
match rx (?i)union\\s+select
match contains <script
match equals exact value
default nomatch
";

    #[test]
    fn first_hitting_directive_decides() {
        let script = PatternScript::parse(SCRIPT).expect("parse");
        assert_eq!(script.decide("healthcheck-<script"), (false, Some(3)));
        assert_eq!(script.decide("1 UNION  SELECT pw"), (true, Some(4)));
        assert_eq!(script.decide("a<script>"), (true, Some(5)));
        assert_eq!(script.decide("exact value"), (true, Some(6)));
        assert_eq!(script.decide("hello"), (false, None));
    }

    #[test]
    fn default_applies_when_nothing_hits() {
        let script =
            PatternScript::parse("#inspect-script\nnomatch suffix .png\ndefault match\n")
                .expect("parse");
        assert_eq!(script.decide("logo.png"), (false, Some(2)));
        assert_eq!(script.decide("shell.php"), (true, None));
    }

    #[test]
    fn run_traces_decision() {
        let script = PatternScript::parse(SCRIPT).expect("parse");
        let tx = Transaction::new("t1").with_debug_level(9);
        assert!(script.run(&tx, "<script>"));
        let entries = tx.debug_entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.contains("line 5"));
    }

    #[test]
    fn header_is_required() {
        let err = PatternScript::parse("match contains x\n").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 1, .. }));
    }

    #[test]
    fn bom_before_header_is_accepted() {
        let source = format!("{BOM}{HEADER}\ndefault match\n");
        assert!(PatternScriptRuntime.recognizes(Path::new("x"), source.as_bytes()));
        PatternScript::parse(&source).expect("parse");
    }

    #[test]
    fn errors_carry_line_numbers() {
        let cases = [
            ("#inspect-script\nblock all\n", 2),
            ("#inspect-script\n\nmatch glob *\n", 3),
            ("#inspect-script\nmatch contains\n", 2),
            ("#inspect-script\ndefault match\ndefault nomatch\n", 3),
            ("#inspect-script\ndefault maybe\n", 2),
        ];
        for (source, expected) in cases {
            match PatternScript::parse(source) {
                Err(ScriptError::Syntax { line, .. }) => assert_eq!(line, expected, "{source}"),
                other => panic!("expected syntax error for {source:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn bad_regex_is_a_pattern_error() {
        let err = PatternScript::parse("#inspect-script\nmatch rx [a-\n").unwrap_err();
        assert!(matches!(err, ScriptError::Pattern { line: 2, .. }));
    }

    #[test]
    fn empty_script_is_rejected() {
        assert!(PatternScript::parse("#inspect-script\n# nothing here\n").is_err());
    }
}
