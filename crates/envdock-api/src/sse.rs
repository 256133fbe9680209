//! Incremental server-sent-event decoder
//!
//! Feeds raw body bytes in, yields complete events out. Events are
//! delimited by a blank line; `data:` lines within an event are joined
//! with newlines per the SSE framing rules.

/// One decoded server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if the event carried one
    pub event: Option<String>,
    /// Joined `data:` payload
    pub data: String,
}

/// Stateful decoder over a byte stream.
///
/// Chunks may split events (and even UTF-8 sequences) at arbitrary
/// positions; the decoder buffers until a full event is available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete event it finishes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some((end, skip)) = find_event_boundary(&self.buf) {
            let block: Vec<u8> = self.buf.drain(..end + skip).take(end).collect();
            let text = String::from_utf8_lossy(&block);
            if let Some(event) = parse_event(&text) {
                events.push(event);
            }
        }
        events
    }
}

/// Locate the first blank-line delimiter, returning (event length,
/// delimiter length). Handles both `\n\n` and `\r\n\r\n` framing.
fn find_event_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n");
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(a), Some(b)) if b < a => Some((b, 4)),
        (Some(a), _) => Some((a, 2)),
        (None, Some(b)) => Some((b, 4)),
        (None, None) => None,
    }
}

fn parse_event(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data: hello\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
        assert_eq!(events[0].event, None);
    }

    #[test]
    fn test_named_event() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"event: progress\ndata: {\"value\":42}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("progress"));
        assert_eq!(events[0].data, "{\"value\":42}");
    }

    #[test]
    fn test_split_across_chunks() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"data: par").is_empty());
        assert!(dec.feed(b"tial").is_empty());
        let events = dec.feed(b"\n\ndata: next\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "partial");
        assert_eq!(events[1].data, "next");
    }

    #[test]
    fn test_crlf_framing() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data: line\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "line");
    }

    #[test]
    fn test_multi_line_data_joined() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data: one\ndata: two\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn test_comment_lines_ignored() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b": keep-alive\n\ndata: real\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "real");
    }

    #[test]
    fn test_no_space_after_colon() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data:compact\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "compact");
    }
}
