//! Key mapping for console input
//!
//! Converts key events to the bytes a line-editing shell expects on its pty.
//! Plain cursor keys become readline control codes rather than VT sequences,
//! so history and cursor motion work without the shell knowing our terminal.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Control code for `ch`, as produced by holding Ctrl.
pub const fn ctrl(ch: u8) -> u8 {
    ch & 0x1F
}

const CTRL_B: u8 = ctrl(b'B');
const CTRL_F: u8 = ctrl(b'F');
const CTRL_H: u8 = ctrl(b'H');
const CTRL_N: u8 = ctrl(b'N');
const CTRL_P: u8 = ctrl(b'P');

/// Key mapper for converting key events to bytes
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent to bytes for the pty
    pub fn map(event: &KeyEvent) -> Option<Vec<u8>> {
        let mods = Modifiers::from(event.modifiers);

        match event.code {
            // Character keys
            KeyCode::Char(ch) => Some(Self::map_char(ch, mods)),

            KeyCode::Enter => Some(vec![b'\r']),
            KeyCode::Backspace => Some(vec![CTRL_H]),

            // Tab
            KeyCode::Tab => Some(vec![b'\t']),
            KeyCode::BackTab => Some(b"\x1b[Z".to_vec()),

            // Escape
            KeyCode::Esc => Some(vec![0x1B]),

            // Arrow keys
            KeyCode::Up => Some(Self::arrow_key(b'A', CTRL_P, mods)),
            KeyCode::Down => Some(Self::arrow_key(b'B', CTRL_N, mods)),
            KeyCode::Right => Some(Self::arrow_key(b'C', CTRL_F, mods)),
            KeyCode::Left => Some(Self::arrow_key(b'D', CTRL_B, mods)),

            // Navigation keys
            KeyCode::Home => Some(Self::special_key(b'H', mods)),
            KeyCode::End => Some(Self::special_key(b'F', mods)),
            KeyCode::PageUp => Some(Self::tilde_key(5, mods)),
            KeyCode::PageDown => Some(Self::tilde_key(6, mods)),
            KeyCode::Insert => Some(Self::tilde_key(2, mods)),
            KeyCode::Delete => Some(Self::tilde_key(3, mods)),

            // Function keys
            KeyCode::F(n) => Self::function_key(n),

            _ => None,
        }
    }

    /// The single byte a key event would produce in a raw curses-style read,
    /// used for shortcut matching. Ctrl+letter gives the control code.
    pub fn key_byte(event: &KeyEvent) -> Option<u8> {
        let mods = Modifiers::from(event.modifiers);
        match event.code {
            KeyCode::Char(ch) if ch.is_ascii() => {
                if mods.contains(Modifiers::CTRL) {
                    Some(ctrl(ch as u8))
                } else {
                    Some(ch as u8)
                }
            }
            KeyCode::Esc => Some(0x1B),
            KeyCode::Tab => Some(b'\t'),
            _ => None,
        }
    }

    /// Map a character with modifiers
    fn map_char(ch: char, mods: Modifiers) -> Vec<u8> {
        // Ctrl + letter = control character
        if mods.contains(Modifiers::CTRL) && !mods.contains(Modifiers::ALT) {
            if ch.is_ascii_alphabetic() {
                return vec![ctrl(ch.to_ascii_uppercase() as u8)];
            }
            match ch {
                '@' | '`' | ' ' => return vec![0x00],
                '[' => return vec![0x1B],
                '\\' => return vec![0x1C],
                ']' => return vec![0x1D],
                '^' | '~' => return vec![0x1E],
                '_' | '?' => return vec![0x1F],
                _ => {}
            }
        }

        // Ctrl + Alt + letter
        if mods.contains(Modifiers::CTRL | Modifiers::ALT) && ch.is_ascii_alphabetic() {
            return vec![0x1B, ctrl(ch.to_ascii_uppercase() as u8)];
        }

        // Alt + key = ESC + key
        if mods.contains(Modifiers::ALT) {
            let mut bytes = vec![0x1B];
            bytes.extend(ch.to_string().as_bytes());
            return bytes;
        }

        ch.to_string().into_bytes()
    }

    /// Plain arrows become readline motion codes; modified arrows keep the
    /// xterm form.
    fn arrow_key(key: u8, plain: u8, mods: Modifiers) -> Vec<u8> {
        let mods = mods - Modifiers::SHIFT;
        if mods.is_empty() {
            vec![plain]
        } else {
            format!("\x1b[1;{}{}", Self::modifier_code(mods), key as char).into_bytes()
        }
    }

    /// Special key (Home, End) sequence
    fn special_key(key: u8, mods: Modifiers) -> Vec<u8> {
        if mods.is_empty() {
            vec![0x1B, b'[', key]
        } else {
            format!("\x1b[1;{}{}", Self::modifier_code(mods), key as char).into_bytes()
        }
    }

    /// Tilde key sequence (PageUp, PageDown, Insert, Delete)
    fn tilde_key(code: u8, mods: Modifiers) -> Vec<u8> {
        if mods.is_empty() {
            format!("\x1b[{}~", code).into_bytes()
        } else {
            format!("\x1b[{};{}~", code, Self::modifier_code(mods)).into_bytes()
        }
    }

    /// Function key sequence
    fn function_key(n: u8) -> Option<Vec<u8>> {
        let seq: &[u8] = match n {
            1 => b"\x1bOP",
            2 => b"\x1bOQ",
            3 => b"\x1bOR",
            4 => b"\x1bOS",
            5 => b"\x1b[15~",
            6 => b"\x1b[17~",
            7 => b"\x1b[18~",
            8 => b"\x1b[19~",
            9 => b"\x1b[20~",
            10 => b"\x1b[21~",
            11 => b"\x1b[23~",
            12 => b"\x1b[24~",
            _ => return None,
        };
        Some(seq.to_vec())
    }

    /// Calculate xterm modifier code
    fn modifier_code(mods: Modifiers) -> u8 {
        1 + if mods.contains(Modifiers::SHIFT) { 1 } else { 0 }
            + if mods.contains(Modifiers::ALT) { 2 } else { 0 }
            + if mods.contains(Modifiers::CTRL) { 4 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn test_char_keys() {
        let event = key_event(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(b"a".to_vec()));

        // Ctrl+C
        let event = key_event(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), Some(vec![0x03]));

        // Alt+x
        let event = key_event(KeyCode::Char('x'), KeyModifiers::ALT);
        assert_eq!(KeyMapper::map(&event), Some(vec![0x1B, b'x']));

        let event = key_event(KeyCode::Char('あ'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some("あ".as_bytes().to_vec()));
    }

    #[test]
    fn test_arrows_become_readline_codes() {
        let cases = [
            (KeyCode::Up, 0x10),
            (KeyCode::Down, 0x0E),
            (KeyCode::Left, 0x02),
            (KeyCode::Right, 0x06),
        ];
        for (code, byte) in cases {
            assert_eq!(KeyMapper::map(&key_event(code, KeyModifiers::NONE)), Some(vec![byte]));
        }

        let event = key_event(KeyCode::Up, KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), Some(b"\x1b[1;5A".to_vec()));
    }

    #[test]
    fn test_backspace_and_enter() {
        let event = key_event(KeyCode::Backspace, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(vec![0x08]));
        let event = key_event(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(vec![b'\r']));
    }

    #[test]
    fn test_function_keys() {
        let event = key_event(KeyCode::F(1), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(b"\x1bOP".to_vec()));

        let event = key_event(KeyCode::F(5), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(b"\x1b[15~".to_vec()));

        assert_eq!(KeyMapper::map(&key_event(KeyCode::F(20), KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_key_byte() {
        let event = key_event(KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::key_byte(&event), Some(0x11));
        let event = key_event(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::key_byte(&event), Some(b'q'));
        let event = key_event(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(KeyMapper::key_byte(&event), Some(ctrl(b'[')));
        assert_eq!(KeyMapper::key_byte(&key_event(KeyCode::Up, KeyModifiers::NONE)), None);
    }
}
