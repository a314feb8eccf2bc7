//! Incremental server-sent-events parsing.
//!
//! The backend streams progress over SSE while a separation or alignment
//! job runs. Chunks arrive at arbitrary boundaries, so the parser buffers
//! input and only emits events once their terminating blank line has been
//! seen.

/// One server-sent event: a named type and its data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Buffering SSE parser. Feed it raw chunks as they arrive; it yields the
/// events completed by each chunk.
///
/// The buffer is bytes, not text: network chunk boundaries can fall inside
/// a multi-byte UTF-8 sequence, so decoding only happens once a complete
/// event block has been delimited. Block delimiters are ASCII newlines,
/// which never occur inside a multi-byte sequence.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of the stream and return any completed events.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        // CRLF streams normalize to LF before block splitting. A trailing
        // bare \r is kept; its \n may open the next chunk.
        if self.buffer.contains(&b'\r') {
            let mut normalized = Vec::with_capacity(self.buffer.len());
            let mut bytes = self.buffer.iter().copied().peekable();
            while let Some(byte) = bytes.next() {
                if byte == b'\r' && bytes.peek() == Some(&b'\n') {
                    continue;
                }
                normalized.push(byte);
            }
            self.buffer = normalized;
        }

        let mut events = Vec::new();
        while let Some(boundary) = self.buffer.windows(2).position(|pair| pair == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..boundary + 2).collect();
            let text = String::from_utf8_lossy(&block);
            if let Some(event) = parse_block(text.trim_end_matches('\n')) {
                events.push(event);
            }
        }
        events
    }
}

/// Parse one complete event block. Comment lines (leading `:`) and unknown
/// fields are skipped; multiple `data:` lines are joined with newlines.
fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = String::new();
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = value.to_string(),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if event.is_empty() && data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        // The SSE default event type
        event: if event.is_empty() {
            "message".to_string()
        } else {
            event
        },
        data: data_lines.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: infer_start\ndata: {\"time\": 1.0}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "infer_start");
        assert_eq!(events[0].data, "{\"time\": 1.0}");
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"event: resu").is_empty());
        assert!(parser.push(b"lts\ndata: {\"filenames\"").is_empty());
        let events = parser.push(b": []}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "results");
        assert_eq!(events[0].data, "{\"filenames\": []}");
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: a\ndata: 1\n\nevent: b\ndata: 2\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "a");
        assert_eq!(events[1].event, "b");
    }

    #[test]
    fn test_crlf_stream() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: ping\r\ndata: {}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "ping");
    }

    #[test]
    fn test_comments_and_blank_blocks_skipped() {
        let mut parser = SseParser::new();
        let events = parser.push(b": keepalive\n\nevent: real\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "real");
    }

    #[test]
    fn test_data_only_event_defaults_to_message() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: hello\n\n");
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let payload = "event: alignment\ndata: {\"text\": \"日本語\"}\n\n".as_bytes();
        // Split inside the first three-byte character
        let split = payload.iter().position(|b| *b > 0x7f).unwrap() + 1;
        let (head, tail) = payload.split_at(split);

        let mut parser = SseParser::new();
        assert!(parser.push(head).is_empty());
        let events = parser.push(tail);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"text\": \"日本語\"}");
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: e\ndata: line1\ndata: line2\n\n");
        assert_eq!(events[0].data, "line1\nline2");
    }
}
