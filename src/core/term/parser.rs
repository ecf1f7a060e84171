//! Escape sequence interpreter
//!
//! Classifies the child's byte stream and applies it to a [`VirtualScreen`].
//!
//! Parse state survives across [`Interpreter::feed`] calls, so a CSI
//! sequence, OSC string or UTF-8 character split over two reads is applied
//! once, as if it had arrived whole.
//!
//! | Input                      | Effect                                   |
//! |----------------------------|------------------------------------------|
//! | CR / LF                    | column 0 / next row, scrolling at bottom |
//! | BS, HT                     | cursor left / next tab stop              |
//! | BEL                        | counted and reported to the caller       |
//! | `ESC [` params final       | A B C D K P m r H f J, others swallowed  |
//! | `ESC ]` ... BEL or `ESC \` | swallowed                                |
//! | `ESC ' '` x, `ESC &` x     | swallowed (3 bytes)                      |
//! | `ESC` x y z                | swallowed (4 bytes)                      |
//! | UTF-8 lead + continuation  | one character                            |
//! | printable ASCII run        | written in one call                      |

use tracing::trace;

use super::state::VirtualScreen;

const BEL: u8 = 0x07;
const BS: u8 = 0x08;
const HT: u8 = 0x09;
const LF: u8 = 0x0A;
const CR: u8 = 0x0D;
const ESC: u8 = 0x1B;

/// Longest parameter list kept for one CSI sequence.
const MAX_PARAMS: usize = 16;

/// Interpreter state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ParserState {
    #[default]
    Ground,
    Escape,
    /// Discarding the remaining bytes of a fixed-length escape
    Skip(u8),
    Csi,
    Osc,
    /// ESC seen inside an OSC string, waiting for `\`
    OscEscape,
    /// Collecting a multi-byte UTF-8 character
    Utf8 { need: u8 },
}

/// What a call to [`Interpreter::feed`] produced besides screen changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedOutcome {
    /// BEL characters seen outside OSC strings
    pub bells: usize,
}

/// Byte-stream interpreter for the console view.
pub struct Interpreter {
    state: ParserState,
    params: Vec<u16>,
    current_param: Option<u16>,
    /// `?`, `=` or `<` marker: the sequence is private and ignored
    private: bool,
    utf8: Vec<u8>,
    text: String,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            state: ParserState::Ground,
            params: Vec::with_capacity(MAX_PARAMS),
            current_param: None,
            private: false,
            utf8: Vec::with_capacity(4),
            text: String::new(),
        }
    }

    /// Apply a buffer of child output to `screen`.
    pub fn feed(&mut self, bytes: &[u8], screen: &mut VirtualScreen) -> FeedOutcome {
        let mut outcome = FeedOutcome::default();
        for &byte in bytes {
            self.advance(byte, screen, &mut outcome);
        }
        self.flush_text(screen);
        outcome
    }

    fn advance(&mut self, byte: u8, screen: &mut VirtualScreen, outcome: &mut FeedOutcome) {
        match self.state {
            ParserState::Ground => self.ground(byte, screen, outcome),
            ParserState::Escape => self.escape(byte),
            ParserState::Skip(remaining) => {
                if byte == ESC {
                    // A new sequence cuts the skip short rather than being eaten.
                    self.state = ParserState::Escape;
                } else if remaining <= 1 {
                    self.state = ParserState::Ground;
                } else {
                    self.state = ParserState::Skip(remaining - 1);
                }
            }
            ParserState::Csi => self.csi(byte, screen, outcome),
            ParserState::Osc => match byte {
                BEL => self.state = ParserState::Ground,
                ESC => self.state = ParserState::OscEscape,
                _ => {}
            },
            ParserState::OscEscape => {
                if byte == b'\\' {
                    self.state = ParserState::Ground;
                } else {
                    // Unterminated OSC: treat the ESC as the start of a new sequence.
                    self.state = ParserState::Escape;
                    self.escape(byte);
                }
            }
            ParserState::Utf8 { need } => {
                if byte & 0xC0 == 0x80 {
                    self.utf8.push(byte);
                    if need <= 1 {
                        self.finish_utf8();
                    } else {
                        self.state = ParserState::Utf8 { need: need - 1 };
                    }
                } else {
                    // Truncated character: drop it and reprocess this byte.
                    trace!("Dropping truncated UTF-8 sequence {:02X?}", self.utf8);
                    self.utf8.clear();
                    self.state = ParserState::Ground;
                    self.ground(byte, screen, outcome);
                }
            }
        }
    }

    fn ground(&mut self, byte: u8, screen: &mut VirtualScreen, outcome: &mut FeedOutcome) {
        match byte {
            0x20..=0x7E => {
                self.text.push(byte as char);
                return;
            }
            0xC0..=0xFF => {
                let need = match byte >> 4 {
                    0xC | 0xD => 1,
                    0xE => 2,
                    _ => 3,
                };
                self.utf8.clear();
                self.utf8.push(byte);
                self.state = ParserState::Utf8 { need };
                return;
            }
            _ => {}
        }

        self.flush_text(screen);
        match byte {
            CR => screen.carriage_return(),
            LF => screen.line_feed(),
            BS => screen.backspace(),
            HT => screen.horizontal_tab(),
            BEL => outcome.bells += 1,
            ESC => self.state = ParserState::Escape,
            // Stray continuation byte
            0x80..=0xBF => self.text.push(char::REPLACEMENT_CHARACTER),
            // Other C0 controls and DEL have no visible effect
            _ => {}
        }
    }

    fn escape(&mut self, byte: u8) {
        self.state = match byte {
            b'[' => {
                self.params.clear();
                self.current_param = None;
                self.private = false;
                ParserState::Csi
            }
            b']' => ParserState::Osc,
            b' ' | b'&' => ParserState::Skip(1),
            ESC => ParserState::Escape,
            _ => ParserState::Skip(2),
        };
    }

    fn csi(&mut self, byte: u8, screen: &mut VirtualScreen, outcome: &mut FeedOutcome) {
        match byte {
            b'0'..=b'9' => {
                let digit = (byte - b'0') as u16;
                self.current_param = Some(self.current_param.unwrap_or(0).saturating_mul(10).saturating_add(digit));
            }
            b';' | b':' => {
                self.push_param();
            }
            b'>' => {}
            b'?' | b'=' | b'<' => self.private = true,
            // Intermediates carry no meaning for the finals handled here.
            0x20..=0x2F => {}
            0x40..=0x7E => {
                self.push_param();
                self.state = ParserState::Ground;
                if self.private {
                    trace!("Ignoring private CSI {:?} {}", self.params, byte as char);
                } else {
                    self.dispatch_csi(byte, screen);
                }
            }
            ESC => self.state = ParserState::Escape,
            // C0 controls take effect inside a sequence without ending it.
            CR => screen.carriage_return(),
            LF => screen.line_feed(),
            BS => screen.backspace(),
            HT => screen.horizontal_tab(),
            BEL => outcome.bells += 1,
            _ => {
                trace!("Abandoning malformed CSI at byte {:02X}", byte);
                self.state = ParserState::Ground;
            }
        }
    }

    fn push_param(&mut self) {
        if let Some(p) = self.current_param.take() {
            if self.params.len() < MAX_PARAMS {
                self.params.push(p);
            }
        } else if self.params.len() < MAX_PARAMS {
            self.params.push(0);
        }
    }

    fn dispatch_csi(&mut self, final_byte: u8, screen: &mut VirtualScreen) {
        let first = self.params.first().copied().unwrap_or(0);
        let count = first.max(1) as i32;

        match final_byte {
            b'A' => screen.move_cursor(-count, 0),
            b'B' => screen.move_cursor(count, 0),
            b'C' => screen.move_cursor(0, count),
            b'D' => screen.move_cursor(0, -count),
            b'K' => screen.erase_in_line(first),
            b'P' => screen.delete_chars(first),
            b'J' => screen.erase_in_display(first),
            b'H' | b'f' => {
                let row = first.max(1) - 1;
                let col = self.params.get(1).copied().unwrap_or(0).max(1) - 1;
                screen.set_cursor(row, col);
            }
            b'r' => {
                let bottom = self.params.get(1).copied().unwrap_or(0);
                screen.set_scroll_region(first, bottom);
            }
            b'm' => {
                for &p in &self.params {
                    match p {
                        0 | 27 => screen.set_reverse(false),
                        7 => screen.set_reverse(true),
                        _ => {}
                    }
                }
            }
            _ => trace!("Swallowing CSI {:?} {}", self.params, final_byte as char),
        }
    }

    fn finish_utf8(&mut self) {
        self.state = ParserState::Ground;
        match std::str::from_utf8(&self.utf8) {
            Ok(s) => self.text.push_str(s),
            Err(_) => self.text.push(char::REPLACEMENT_CHARACTER),
        }
        self.utf8.clear();
    }

    fn flush_text(&mut self, screen: &mut VirtualScreen) {
        if !self.text.is_empty() {
            screen.write_run(&self.text);
            self.text.clear();
        }
    }
}
