use anyhow::Result;
use futures_util::{pin_mut, Stream, StreamExt};
use tracing::debug;
use unitutor_shared::StreamPayload;

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

/// Incremental UTF-8 decoder for byte streams.
///
/// A multi-byte character split across two chunks is held back until its
/// remaining bytes arrive. An invalid interior sequence is replaced with
/// U+FFFD and skipped so one bad byte cannot abort the stream.
#[derive(Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, appending complete characters to `out`.
    pub fn decode(&mut self, chunk: &[u8], out: &mut String) {
        self.pending.extend_from_slice(chunk);

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    // The first `valid` bytes are known-good UTF-8.
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        // Incomplete trailing sequence; more may follow.
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                        Some(bad) => {
                            out.push('\u{FFFD}');
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }

    /// True if bytes of an unfinished character are still buffered.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

enum LineOutcome {
    Consumed,
    /// The line could not be parsed and more data is expected; requeue it.
    PushBack,
}

/// Assembles an SSE-framed delta stream into the full assistant message.
///
/// Feed raw response bytes with [`push`](Self::push); each successfully
/// parsed content delta appends to the accumulated message and reports the
/// *entire* content so far to the callback (callers replace their displayed
/// text, they do not append). [`finish`](Self::finish) runs the lenient
/// end-of-stream pass and returns the final content.
pub struct ResponseAssembler {
    decoder: Utf8StreamDecoder,
    buffer: String,
    content: String,
    done: bool,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self {
            decoder: Utf8StreamDecoder::new(),
            buffer: String::new(),
            content: String::new(),
            done: false,
        }
    }

    /// True once the `[DONE]` terminator has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The content accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consume one chunk of response bytes, extracting every complete line.
    pub fn push<F: FnMut(&str)>(&mut self, chunk: &[u8], mut on_update: F) {
        if self.done {
            return;
        }
        self.decoder.decode(chunk, &mut self.buffer);
        self.drain_lines(&mut on_update, false);
    }

    /// Flush residual buffered text and return the final content.
    ///
    /// Data lines after a `[DONE]` terminator are ignored. A line that still
    /// fails to parse here is dropped: nothing more is coming.
    pub fn finish<F: FnMut(&str)>(mut self, mut on_update: F) -> String {
        if !self.done {
            self.drain_lines(&mut on_update, true);
            if !self.done && !self.buffer.is_empty() {
                let line = std::mem::take(&mut self.buffer);
                self.handle_line(&line, &mut on_update, true);
            }
        }
        self.content
    }

    fn drain_lines<F: FnMut(&str)>(&mut self, on_update: &mut F, at_end: bool) {
        while !self.done {
            let Some(pos) = self.buffer.find('\n') else {
                break;
            };
            let mut line: String = self.buffer.drain(..=pos).collect();
            line.pop();
            match self.handle_line(&line, on_update, at_end) {
                LineOutcome::Consumed => {}
                LineOutcome::PushBack => {
                    line.push('\n');
                    self.buffer.insert_str(0, &line);
                    break;
                }
            }
        }
    }

    fn handle_line<F: FnMut(&str)>(
        &mut self,
        raw: &str,
        on_update: &mut F,
        at_end: bool,
    ) -> LineOutcome {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.is_empty() || line.starts_with(':') {
            return LineOutcome::Consumed;
        }
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return LineOutcome::Consumed;
        };
        let payload = payload.trim();
        if payload == DONE_MARKER {
            self.done = true;
            return LineOutcome::Consumed;
        }

        match serde_json::from_str::<StreamPayload>(payload) {
            Ok(parsed) => {
                if let Some(text) = parsed.delta_content() {
                    self.content.push_str(text);
                    on_update(&self.content);
                }
                LineOutcome::Consumed
            }
            Err(err) if at_end => {
                debug!("dropping unparsable trailing frame: {}", err);
                LineOutcome::Consumed
            }
            // Likely a frame split across chunk boundaries; retry once more
            // data has arrived.
            Err(_) => LineOutcome::PushBack,
        }
    }
}

impl Default for ResponseAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain a byte stream into the final assistant message.
///
/// `on_update` receives the full accumulated content after every parsed
/// delta. Returns once the stream ends or the `[DONE]` terminator is seen.
pub async fn assemble<S, B, E, F>(stream: S, mut on_update: F) -> Result<String>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
    F: FnMut(&str),
{
    pin_mut!(stream);
    let mut assembler = ResponseAssembler::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        assembler.push(chunk.as_ref(), &mut on_update);
        if assembler.is_done() {
            break;
        }
    }
    Ok(assembler.finish(on_update))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::convert::Infallible;

    fn run_chunks(chunks: &[&[u8]]) -> (Vec<String>, String) {
        let mut updates = Vec::new();
        let mut assembler = ResponseAssembler::new();
        for chunk in chunks {
            assembler.push(chunk, |content| updates.push(content.to_string()));
        }
        let final_content = assembler.finish(|content| updates.push(content.to_string()));
        (updates, final_content)
    }

    fn delta_frame(text: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":{}}}}}]}}\n",
            serde_json::to_string(text).unwrap()
        )
    }

    #[test]
    fn frame_split_mid_json_yields_one_update() {
        let (updates, content) = run_chunks(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel",
            b"lo\"}}]}\n",
            b"data: [DONE]\n",
        ]);
        assert_eq!(updates, vec!["Hello"]);
        assert_eq!(content, "Hello");
    }

    #[test]
    fn sequential_deltas_report_accumulated_content() {
        let input = format!("{}{}", delta_frame("A"), delta_frame("B"));
        let (updates, content) = run_chunks(&[input.as_bytes()]);
        assert_eq!(updates, vec!["A", "AB"]);
        assert_eq!(content, "AB");
    }

    #[test]
    fn unparsable_line_then_done_yields_nothing() {
        let (updates, content) = run_chunks(&[b"data: not-json\n", b"data: [DONE]\n"]);
        assert!(updates.is_empty());
        assert_eq!(content, "");
    }

    #[test]
    fn data_lines_after_done_are_ignored() {
        let input = format!("data: [DONE]\n{}", delta_frame("late"));
        let (updates, content) = run_chunks(&[input.as_bytes()]);
        assert!(updates.is_empty());
        assert_eq!(content, "");
    }

    #[test]
    fn comments_blank_and_foreign_lines_never_update() {
        let (updates, content) = run_chunks(&[
            b": keep-alive\n",
            b"\n",
            b"event: message\n",
            b"\r\n",
        ]);
        assert!(updates.is_empty());
        assert_eq!(content, "");
    }

    #[test]
    fn missing_or_empty_content_is_skipped() {
        let (updates, content) = run_chunks(&[
            b"data: {\"choices\":[{\"delta\":{}}]}\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n",
            b"data: {}\n",
        ]);
        assert!(updates.is_empty());
        assert_eq!(content, "");
    }

    #[test]
    fn trailing_carriage_return_is_stripped() {
        let frame = delta_frame("ok").replace('\n', "\r\n");
        let (updates, content) = run_chunks(&[frame.as_bytes()]);
        assert_eq!(updates, vec!["ok"]);
        assert_eq!(content, "ok");
    }

    #[test]
    fn bad_line_mid_stream_does_not_abort_later_frames() {
        // The bad line is pushed back, stalling extraction; the final pass
        // drops it and still processes the valid frame behind it.
        let (updates, content) = run_chunks(&[b"data: not-json\n", delta_frame("ok").as_bytes()]);
        assert_eq!(updates, vec!["ok"]);
        assert_eq!(content, "ok");
    }

    #[test]
    fn chunking_never_changes_the_result() {
        let input = format!(
            "{}{}{}data: [DONE]\n",
            delta_frame("caf\u{e9} "),
            delta_frame("\u{1F393}"),
            delta_frame(" done")
        );
        let bytes = input.as_bytes();

        let (_, expected) = run_chunks(&[bytes]);
        assert_eq!(expected, "caf\u{e9} \u{1F393} done");

        // Every two-chunk split, including mid-UTF-8 and mid-JSON ones.
        for split in 0..=bytes.len() {
            let (updates, content) = run_chunks(&[&bytes[..split], &bytes[split..]]);
            assert_eq!(content, expected, "split at byte {split}");
            for pair in updates.windows(2) {
                assert!(pair[0].len() <= pair[1].len());
            }
            assert_eq!(updates.last().map(String::as_str), Some(expected.as_str()));
        }
    }

    #[test]
    fn updates_are_monotonic_and_last_equals_final() {
        let input = format!(
            "{}{}{}",
            delta_frame("one "),
            delta_frame("two "),
            delta_frame("three")
        );
        let (updates, content) = run_chunks(&[input.as_bytes()]);
        assert_eq!(updates.len(), 3);
        for pair in updates.windows(2) {
            assert!(pair[0].len() < pair[1].len());
        }
        assert_eq!(updates.last().unwrap(), &content);
    }

    #[test]
    fn unterminated_trailing_frame_is_flushed_at_end() {
        // No trailing newline on the last frame; the final pass parses it.
        let frame = delta_frame("tail");
        let (updates, content) = run_chunks(&[frame.trim_end().as_bytes()]);
        assert_eq!(updates, vec!["tail"]);
        assert_eq!(content, "tail");
    }

    #[test]
    fn decoder_holds_back_incomplete_multibyte_sequence() {
        let bytes = "\u{1F393}".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();

        decoder.decode(&bytes[..2], &mut out);
        assert_eq!(out, "");
        assert!(decoder.has_pending());

        decoder.decode(&bytes[2..], &mut out);
        assert_eq!(out, "\u{1F393}");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn decoder_replaces_invalid_interior_bytes() {
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        decoder.decode(b"a\xFFb", &mut out);
        assert_eq!(out, "a\u{FFFD}b");
    }

    #[tokio::test]
    async fn assemble_drains_a_chunked_stream() {
        let chunks: Vec<Result<Vec<u8>, Infallible>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel".to_vec()),
            Ok(b"lo\"}}]}\n".to_vec()),
            Ok(b"data: [DONE]\n".to_vec()),
            // Never reached: assembly stops at the terminator.
            Ok(delta_frame("late").into_bytes()),
        ];
        let mut updates = Vec::new();
        let content = assemble(stream::iter(chunks), |c| updates.push(c.to_string()))
            .await
            .unwrap();
        assert_eq!(updates, vec!["Hello"]);
        assert_eq!(content, "Hello");
    }

    #[tokio::test]
    async fn assemble_propagates_transport_errors() {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(delta_frame("partial").into_bytes()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let result = assemble(stream::iter(chunks), |_| {}).await;
        assert!(result.is_err());
    }
}
