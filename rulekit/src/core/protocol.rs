//! Contract between `@inspectFile` and the external programs it runs.
//!
//! A program receives the extracted value as its trailing argument and answers
//! through the first byte of standard output:
//!
//! | stdout                 | verdict  |
//! |------------------------|----------|
//! | empty                  | no match |
//! | starts with `1`        | no match |
//! | anything else non-empty| match    |
//!
//! The sentinel is inverted compared to most conventions: `1` means the value
//! is clean. Programs that print `1` to flag an attack silently never match.

use std::path::Path;

/// First stdout byte that reports "no match".
pub const NO_MATCH_SENTINEL: u8 = b'1';

/// Apply the output protocol to everything a program wrote to stdout.
pub fn output_matches(output: &[u8]) -> bool {
    match output.first() {
        None => false,
        Some(&first) => first != NO_MATCH_SENTINEL,
    }
}

/// Build the `sh -c` line `<target> <value>`.
///
/// The target is quoted so resolved paths containing spaces still run. The
/// value is appended verbatim and is therefore parsed by the shell: a value
/// containing `;` or `$(...)` runs commands. Rule authors opt into this by
/// choosing shell invocation.
pub fn shell_command_line(target: &Path, value: &str) -> String {
    format!("{} {}", shell_quote(&target.to_string_lossy()), value)
}

fn shell_quote(raw: &str) -> String {
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('\'');
    for ch in raw.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_protocol_table() {
        let cases: [(&[u8], bool); 7] = [
            (b"", false),
            (b"1", false),
            (b"1 ok", false),
            (b"10\n", false),
            (b"0 ok", true),
            (b"2", true),
            (b"\n", true),
        ];
        for (output, expected) in cases {
            assert_eq!(
                output_matches(output),
                expected,
                "output {:?}",
                String::from_utf8_lossy(output)
            );
        }
    }

    #[test]
    fn shell_line_quotes_target_but_not_value() {
        let line = shell_command_line(Path::new("/opt/scan it/o'k.sh"), "a b");
        assert_eq!(line, r"'/opt/scan it/o'\''k.sh' a b");
    }
}
