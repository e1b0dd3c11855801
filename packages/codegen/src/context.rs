/// Indented text buffer used by generators
#[derive(Debug)]
pub struct CodeWriter {
    buffer: String,
    indent_level: usize,
    indent: &'static str,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::with_indent("    ")
    }

    pub fn with_indent(indent: &'static str) -> Self {
        Self {
            buffer: String::new(),
            indent_level: 0,
            indent,
        }
    }

    pub fn add(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Write one line at the current indentation; empty lines stay empty
    pub fn add_line(&mut self, text: &str) {
        if !text.is_empty() {
            for _ in 0..self.indent_level {
                self.buffer.push_str(self.indent);
            }
            self.buffer.push_str(text);
        }
        self.buffer.push('\n');
    }

    /// Write `open`, indent, run `body`, dedent, write `close`
    pub fn block(&mut self, open: &str, close: &str, body: impl FnOnce(&mut Self)) {
        self.add_line(open);
        self.indent();
        body(self);
        self.dedent();
        self.add_line(close);
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    pub fn finish(self) -> String {
        self.buffer
    }
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}
