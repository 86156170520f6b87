//! TR-008: Indentation-aware text accumulator shared by every emitter.
//!
//! Emission order is program order: nothing is ever inserted before text
//! that was already appended.

const INDENT: &str = "    ";

/// Render the indentation prefix for a nesting level.
pub fn indentation(level: usize) -> String {
    INDENT.repeat(level)
}

/// Accumulates generated source line by line.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    buf: String,
    level: usize,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line at the current indentation. Text containing newlines
    /// is written as-is after the first line's indentation, so callers that
    /// render nested code must indent continuation lines themselves.
    pub fn append_line(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        if !line.is_empty() {
            self.buf.push_str(&indentation(self.level));
            self.buf.push_str(line);
        }
        self.buf.push('\n');
    }

    /// Append an empty line.
    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    pub fn indent(&mut self) {
        self.level += 1;
    }

    pub fn dedent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    /// Write `header {` and indent.
    pub fn open_block(&mut self, header: impl AsRef<str>) {
        self.append_line(format!("{} {{", header.as_ref()));
        self.indent();
    }

    /// Dedent and close the current block.
    pub fn end_block(&mut self) {
        self.end_block_with("}");
    }

    /// Dedent and close the current block with custom closing text, e.g. `},`.
    pub fn end_block_with(&mut self, closing: &str) {
        self.dedent();
        self.append_line(closing);
    }

    pub fn indent_level(&self) -> usize {
        self.level
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tr008_blocks_indent() {
        let mut b = CodeBuilder::new();
        b.open_block("fn main()");
        b.append_line("let x = 1;");
        b.end_block();
        assert_eq!(b.as_str(), "fn main() {\n    let x = 1;\n}\n");
    }

    #[test]
    fn test_tr008_open_block_same_line() {
        let mut b = CodeBuilder::new();
        b.open_block("impl Foo");
        b.open_block("pub fn new() -> Self");
        b.append_line("Self");
        b.end_block();
        b.end_block();
        assert_eq!(
            b.as_str(),
            "impl Foo {\n    pub fn new() -> Self {\n        Self\n    }\n}\n"
        );
    }

    #[test]
    fn test_tr008_empty_line_has_no_trailing_spaces() {
        let mut b = CodeBuilder::new();
        b.indent();
        b.append_line("");
        b.blank();
        assert_eq!(b.as_str(), "\n\n");
    }

    #[test]
    fn test_tr008_dedent_saturates() {
        let mut b = CodeBuilder::new();
        b.dedent();
        assert_eq!(b.indent_level(), 0);
        b.append_line("x");
        assert_eq!(b.into_string(), "x\n");
    }

    #[test]
    fn test_tr008_end_block_with_suffix() {
        let mut b = CodeBuilder::new();
        b.open_block("mod m");
        b.end_block_with("} // end");
        assert_eq!(b.as_str(), "mod m {\n} // end\n");
    }

    #[test]
    fn test_tr008_indentation() {
        assert_eq!(indentation(0), "");
        assert_eq!(indentation(2), "        ");
    }
}
