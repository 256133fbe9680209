//! Log line assembly for the viewer
//!
//! Chunks arrive from the stream with arbitrary framing: `\n` terminates a
//! line, `\r` rewinds the current line (progress bars redraw this way), and
//! a trailing fragment is shown provisionally until its terminator arrives.

/// Accumulates raw log chunks into displayable lines
#[derive(Debug, Default)]
pub struct LogLineBuffer {
    lines: Vec<String>,
    partial: String,
}

impl LogLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one raw chunk into the buffer
    pub fn push_chunk(&mut self, chunk: &str) {
        for ch in chunk.chars() {
            match ch {
                '\n' => self.lines.push(std::mem::take(&mut self.partial)),
                '\r' => self.partial.clear(),
                c => self.partial.push(c),
            }
        }
    }

    /// Completed lines only
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The unterminated tail, if any
    pub fn partial(&self) -> Option<&str> {
        if self.partial.is_empty() {
            None
        } else {
            Some(&self.partial)
        }
    }

    /// Everything to render: completed lines plus the provisional tail
    pub fn display_lines(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.lines.iter().map(String::as_str).collect();
        if !self.partial.is_empty() {
            out.push(&self.partial);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.lines.len() + usize::from(!self.partial.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.partial.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.partial.clear();
    }
}

/// Scroll position for the log view.
///
/// Auto-scroll pins the view to the newest line; any manual scroll releases
/// the pin until the user returns to the bottom.
#[derive(Debug)]
pub struct LogScrollState {
    pub auto_scroll: bool,
    pub offset: usize,
}

impl Default for LogScrollState {
    fn default() -> Self {
        Self {
            auto_scroll: true,
            offset: 0,
        }
    }
}

impl LogScrollState {
    pub fn scroll_up(&mut self, lines: usize) {
        self.auto_scroll = false;
        self.offset = self.offset.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: usize, total: usize, viewport: usize) {
        let max_offset = total.saturating_sub(viewport);
        self.offset = (self.offset + lines).min(max_offset);
        if self.offset == max_offset {
            self.auto_scroll = true;
        }
    }

    pub fn scroll_to_bottom(&mut self, total: usize, viewport: usize) {
        self.offset = total.saturating_sub(viewport);
        self.auto_scroll = true;
    }

    /// Called after new lines arrive; follows the tail while pinned
    pub fn follow(&mut self, total: usize, viewport: usize) {
        if self.auto_scroll {
            self.offset = total.saturating_sub(viewport);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newline_terminates_line() {
        let mut buf = LogLineBuffer::new();
        buf.push_chunk("line1\nline2");
        assert_eq!(buf.lines(), &["line1".to_string()]);
        assert_eq!(buf.partial(), Some("line2"));
        assert_eq!(buf.display_lines(), vec!["line1", "line2"]);
    }

    #[test]
    fn test_carriage_return_rewinds() {
        let mut buf = LogLineBuffer::new();
        buf.push_chunk("abc\rdef\n");
        assert_eq!(buf.lines(), &["def".to_string()]);
        assert_eq!(buf.partial(), None);
    }

    #[test]
    fn test_progress_bar_redraw() {
        let mut buf = LogLineBuffer::new();
        buf.push_chunk("10%\r20%\r30%");
        assert!(buf.lines().is_empty());
        assert_eq!(buf.partial(), Some("30%"));
        buf.push_chunk("\r100%\n");
        assert_eq!(buf.lines(), &["100%".to_string()]);
    }

    #[test]
    fn test_chunks_split_mid_line() {
        let mut buf = LogLineBuffer::new();
        buf.push_chunk("hel");
        buf.push_chunk("lo\nwor");
        buf.push_chunk("ld\n");
        assert_eq!(buf.lines(), &["hello".to_string(), "world".to_string()]);
        assert!(buf.partial().is_none());
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut buf = LogLineBuffer::new();
        buf.push_chunk("a\nb");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn test_scroll_up_releases_auto() {
        let mut scroll = LogScrollState::default();
        scroll.follow(100, 20);
        assert_eq!(scroll.offset, 80);

        scroll.scroll_up(10);
        assert!(!scroll.auto_scroll);
        assert_eq!(scroll.offset, 70);

        // New lines arrive; view must not move while released
        scroll.follow(110, 20);
        assert_eq!(scroll.offset, 70);
    }

    #[test]
    fn test_scroll_to_bottom_resumes_auto() {
        let mut scroll = LogScrollState::default();
        scroll.scroll_up(5);
        assert!(!scroll.auto_scroll);

        scroll.scroll_to_bottom(100, 20);
        assert!(scroll.auto_scroll);
        assert_eq!(scroll.offset, 80);

        scroll.follow(120, 20);
        assert_eq!(scroll.offset, 100);
    }

    #[test]
    fn test_scroll_down_to_bottom_resumes_auto() {
        let mut scroll = LogScrollState::default();
        scroll.scroll_up(3);
        scroll.offset = 70;
        scroll.scroll_down(10, 100, 20);
        assert!(scroll.auto_scroll);
        assert_eq!(scroll.offset, 80);
    }
}
