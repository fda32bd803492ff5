// src/chat/keys.rs - Submit-key handling for the chat input

/// A key event on the chat input, reduced to what submission cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
}

/// What the input layer should do with a key press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyOutcome {
    pub submit: bool,
    /// Suppress the key's default effect (newline insertion for Enter).
    pub prevent_default: bool,
}

/// Enter alone submits and swallows the newline; Shift+Enter keeps the
/// newline; every other key passes through.
pub fn on_key_down(key: Key, modifiers: Modifiers) -> KeyOutcome {
    match key {
        Key::Enter if !modifiers.shift => KeyOutcome {
            submit: true,
            prevent_default: true,
        },
        _ => KeyOutcome::default(),
    }
}

/// Line-oriented terminals cannot see Shift. A line ending in `\` stands in
/// for Shift+Enter; the backslash is stripped.
pub fn classify_line(line: &str) -> (&str, Modifiers) {
    let line = line.trim_end_matches(['\r', '\n']);
    match line.strip_suffix('\\') {
        Some(body) => (body, Modifiers { shift: true }),
        None => (line, Modifiers::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_submits_and_prevents_newline() {
        let outcome = on_key_down(Key::Enter, Modifiers::default());
        assert!(outcome.submit);
        assert!(outcome.prevent_default);
    }

    #[test]
    fn test_shift_enter_inserts_newline() {
        let outcome = on_key_down(Key::Enter, Modifiers { shift: true });
        assert!(!outcome.submit);
        assert!(!outcome.prevent_default);
    }

    #[test]
    fn test_other_keys_pass_through() {
        assert_eq!(on_key_down(Key::Other, Modifiers::default()), KeyOutcome::default());
    }

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("hello\n"), ("hello", Modifiers::default()));
        assert_eq!(classify_line("first\\\n"), ("first", Modifiers { shift: true }));
        assert_eq!(classify_line("\r\n"), ("", Modifiers::default()));
    }
}
