//! Output filter
//!
//! Turns the raw byte stream of a shell into plain text for a line log.
//! UTF-8 sequences are reassembled across chunk boundaries, ANSI escape
//! sequences are swallowed, and the few control characters that matter for
//! a line display (LF, CR, BS, TAB) are forwarded to the sink.

/// Receiver of filtered output
pub trait TextSink {
    fn put_char(&mut self, ch: char);
    fn newline(&mut self);
    /// Lone CR: return to the start of the current line
    fn carriage_return(&mut self);
    fn backspace(&mut self);
}

#[derive(Clone, Copy, Default, PartialEq, Debug)]
enum FilterState {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    Csi,
    /// OSC, DCS, SOS, PM and APC strings, all terminated by BEL or ST
    String,
    EscapeInString,
}

/// Streaming filter; keeps its state between `feed` calls
#[derive(Default)]
pub struct OutputFilter {
    state: FilterState,
    utf8: Vec<u8>,
    utf8_len: usize,
    pending_cr: bool,
}

impl OutputFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes
    pub fn feed<S: TextSink>(&mut self, bytes: &[u8], sink: &mut S) {
        for &b in bytes {
            self.feed_byte(b, sink);
        }
    }

    fn feed_byte<S: TextSink>(&mut self, b: u8, sink: &mut S) {
        // A CR is only a line reset when no LF follows it
        if self.pending_cr {
            self.pending_cr = false;
            if b != b'\n' {
                sink.carriage_return();
            }
        }

        match self.state {
            FilterState::Ground => self.ground(b, sink),
            FilterState::Escape => {
                self.state = match b {
                    b'[' => FilterState::Csi,
                    b']' | b'P' | b'X' | b'^' | b'_' => FilterState::String,
                    0x20..=0x2F => FilterState::EscapeIntermediate,
                    0x1B => FilterState::Escape,
                    _ => FilterState::Ground,
                };
            }
            FilterState::EscapeIntermediate => {
                self.state = match b {
                    0x20..=0x2F => FilterState::EscapeIntermediate,
                    0x1B => FilterState::Escape,
                    _ => FilterState::Ground,
                };
            }
            FilterState::Csi => {
                self.state = match b {
                    0x40..=0x7E => FilterState::Ground,
                    0x1B => FilterState::Escape,
                    _ => FilterState::Csi,
                };
            }
            FilterState::String => {
                self.state = match b {
                    0x07 => FilterState::Ground,
                    0x1B => FilterState::EscapeInString,
                    _ => FilterState::String,
                };
            }
            FilterState::EscapeInString => {
                self.state = match b {
                    b'\\' => FilterState::Ground,
                    0x1B => FilterState::EscapeInString,
                    _ => FilterState::String,
                };
            }
        }
    }

    fn ground<S: TextSink>(&mut self, b: u8, sink: &mut S) {
        if !self.utf8.is_empty() {
            if b & 0xC0 == 0x80 {
                self.utf8.push(b);
                if self.utf8.len() == self.utf8_len {
                    self.flush_utf8(sink);
                }
                return;
            }
            // Sequence cut short by a non-continuation byte
            self.utf8.clear();
            sink.put_char(char::REPLACEMENT_CHARACTER);
        }

        match b {
            0x1B => self.state = FilterState::Escape,
            b'\n' => sink.newline(),
            b'\r' => self.pending_cr = true,
            0x08 => sink.backspace(),
            b'\t' => sink.put_char('\t'),
            0x00..=0x1F | 0x7F => {}
            0x20..=0x7E => sink.put_char(b as char),
            _ => {
                let len = match b {
                    0xC2..=0xDF => 2,
                    0xE0..=0xEF => 3,
                    0xF0..=0xF4 => 4,
                    _ => 0,
                };
                if len == 0 {
                    sink.put_char(char::REPLACEMENT_CHARACTER);
                } else {
                    self.utf8.push(b);
                    self.utf8_len = len;
                }
            }
        }
    }

    fn flush_utf8<S: TextSink>(&mut self, sink: &mut S) {
        match std::str::from_utf8(&self.utf8) {
            Ok(s) => s.chars().for_each(|ch| sink.put_char(ch)),
            Err(_) => sink.put_char(char::REPLACEMENT_CHARACTER),
        }
        self.utf8.clear();
    }
}
