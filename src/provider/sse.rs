//! Line framing for the Codex event stream.

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Data(String),
    /// `data: [DONE]`; nothing after it is read.
    Done,
}

/// Newline-delimited frame parser.
///
/// - Buffers raw bytes so frames and UTF-8 sequences may be split anywhere
/// - Only complete lines are decoded; the trailing partial line is kept
/// - Lines without the `data:` prefix are ignored
#[derive(Debug, Default)]
pub struct SseParser {
    buf: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.drain(..=pos).collect::<Vec<u8>>();
            if let Some(frame) = parse_line(&line) {
                out.push(frame);
            }
        }

        out
    }

    /// Flush an unterminated last line at end of stream.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if self.buf.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buf);
        parse_line(&line)
    }
}

fn parse_line(line: &[u8]) -> Option<SseFrame> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.is_empty() {
        return None;
    }

    let s = match std::str::from_utf8(line) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "skipping SSE line that is not valid UTF-8");
            return None;
        }
    };

    // Other fields (event:, id:, retry:, comments) carry nothing we use.
    let rest = s.strip_prefix(DATA_PREFIX)?;
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    if rest.trim() == DONE_SENTINEL {
        return Some(SseFrame::Done);
    }
    if rest.trim().is_empty() {
        return None;
    }
    Some(SseFrame::Data(rest.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_lines_become_frames_and_other_lines_are_ignored() {
        let mut p = SseParser::new();
        let frames = p.push(b"event: response.created\ndata: {\"a\":1}\n\n: keep-alive\ndata: [DONE]\n");
        assert_eq!(
            frames,
            vec![SseFrame::Data("{\"a\":1}".to_string()), SseFrame::Done]
        );
    }

    #[test]
    fn partial_lines_are_retained_until_complete() {
        let mut p = SseParser::new();
        assert!(p.push(b"data: {\"del").is_empty());
        assert_eq!(
            p.push(b"ta\":\"x\"}\r\n"),
            vec![SseFrame::Data("{\"delta\":\"x\"}".to_string())]
        );
    }

    #[test]
    fn utf8_split_across_chunks_is_reassembled() {
        let bytes = "data: {\"delta\":\"héllo\"}\n".as_bytes();
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut p = SseParser::new();
        assert!(p.push(&bytes[..split]).is_empty());
        assert_eq!(
            p.push(&bytes[split..]),
            vec![SseFrame::Data("{\"delta\":\"héllo\"}".to_string())]
        );
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut p = SseParser::new();
        assert!(p.push(b"data: {}").is_empty());
        assert_eq!(p.finish(), Some(SseFrame::Data("{}".to_string())));
        assert_eq!(p.finish(), None);
    }

    #[test]
    fn invalid_utf8_line_is_skipped() {
        let mut p = SseParser::new();
        let frames = p.push(b"data: \xff\xfe\ndata: ok\n");
        assert_eq!(frames, vec![SseFrame::Data("ok".to_string())]);
    }
}
