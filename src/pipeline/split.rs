use std::mem;

/// One citation as it appeared in the input, whitespace-collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRecord {
    /// A brace-delimited BibTeX record, possibly spanning several input lines.
    Structured(String),
    /// A pre-formatted citation; always a single line.
    Freeform(String),
}

#[derive(Default)]
enum State {
    #[default]
    Idle,
    /// Inside a record that began with `@`; counts braces seen so far.
    Structured {
        opens: usize,
        closes: usize,
    },
    Freeform,
}

/// Segments mixed-format citation text into discrete records.
///
/// Source files interleave well-formed BibTeX entries with lines that are
/// already formatted for display. A record whose first character is `@` is
/// structured and runs until its braces balance; anything else is a freeform
/// record that ends with its line.
///
/// Feed lines with [`Splitter::feed_line`], then call [`Splitter::finish`].
#[derive(Default)]
pub struct Splitter {
    state: State,
    buf: String,
    records: Vec<RawRecord>,
}

impl Splitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one input line, without its terminator. Empty lines separate
    /// nothing and are skipped.
    pub fn feed_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if let State::Idle = self.state {
            self.state = if line.starts_with('@') {
                State::Structured { opens: 0, closes: 0 }
            } else {
                State::Freeform
            };
        }
        if !self.buf.is_empty() {
            self.buf.push('\n');
        }
        self.buf.push_str(line);

        let complete = match &mut self.state {
            State::Idle => unreachable!("state set above"),
            State::Structured { opens, closes } => {
                for ch in line.chars() {
                    match ch {
                        '{' => *opens += 1,
                        '}' => *closes += 1,
                        _ => {}
                    }
                }
                // Balanced and nonzero at a line boundary: the record is over.
                *opens == *closes && *opens > 0
            }
            // Freeform records never span lines.
            State::Freeform => true,
        };
        if complete {
            let structured = matches!(self.state, State::Structured { .. });
            self.flush(structured);
        }
    }

    /// End of input. A structured record whose braces never balanced is
    /// dropped, matching the historical behaviour of the mixed-file importer.
    pub fn finish(self) -> Vec<RawRecord> {
        self.records
    }

    fn flush(&mut self, structured: bool) {
        let text = normalize_ws(&mem::take(&mut self.buf));
        self.state = State::Idle;
        if text.is_empty() {
            return;
        }
        self.records.push(if structured {
            RawRecord::Structured(text)
        } else {
            RawRecord::Freeform(text)
        });
    }
}

/// Split a whole buffer at once.
pub fn split(input: &str) -> Vec<RawRecord> {
    let mut splitter = Splitter::new();
    for line in input.lines() {
        splitter.feed_line(line);
    }
    splitter.finish()
}

/// Collapse every run of whitespace, newlines included, to a single space.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}
