// Text entry over `adb shell input text`.
// The device shell re-parses the argument, so metacharacters need escaping and
// spaces must be sent as `%s`. The command only types ASCII.

use crate::errors::{PilotError, PilotResult};

const SHELL_SPECIAL: &[char] = &[
    '\\', '"', '\'', '`', '$', '&', '|', ';', '<', '>', '(', ')', '*', '?', '~', '!', '#', '[', ']',
    '{', '}',
];

/// Returns true if `input text` can type every character of `text`.
pub fn is_typeable(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii() && !c.is_ascii_control())
}

/// Escape `text` for `adb shell input text`.
pub fn escape_for_adb(text: &str) -> PilotResult<String> {
    if !is_typeable(text) {
        return Err(PilotError::Executor(format!(
            "adb text input supports printable ASCII only, got {text:?}"
        )));
    }
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            ' ' => out.push_str("%s"),
            c if SHELL_SPECIAL.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_and_metacharacters() {
        assert_eq!(escape_for_adb("hello world").unwrap(), "hello%sworld");
        assert_eq!(escape_for_adb("a&b;c").unwrap(), "a\\&b\\;c");
        assert_eq!(escape_for_adb("it's $5").unwrap(), "it\\'s%s\\$5");
    }

    #[test]
    fn rejects_non_ascii() {
        assert!(!is_typeable("café"));
        assert!(!is_typeable("line\nbreak"));
        assert!(matches!(escape_for_adb("你好"), Err(PilotError::Executor(_))));
    }
}
