//! Newline-delimited record framing over arbitrarily chunked byte streams.
//!
//! Bytes are buffered (not decoded text), so a chunk boundary that splits a
//! multi-byte UTF-8 character or a record in the middle never corrupts the
//! output. A newline byte can never occur inside a multi-byte sequence, which
//! makes splitting on `b'\n'` before decoding safe.

use bytes::{Buf, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use super::ThoughtEvent;

/// Reassembles newline-terminated records out of byte chunks.
#[derive(Debug, Default)]
pub struct EventFramer {
    buf: BytesMut,
}

impl EventFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every record it completed, in order.
    ///
    /// Records that are empty after trimming are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line = self.buf.split_to(pos);
            self.buf.advance(1);
            if let Some(record) = decode_record(&line) {
                records.push(record);
            }
        }
        records
    }

    /// Flush trailing content at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        let rest = self.buf.split();
        decode_record(&rest)
    }

    /// Number of buffered bytes not yet terminated by a newline.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn decode_record(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Turn a chunked byte stream into a lazy stream of records.
///
/// A transport error is yielded once and ends the stream; the partial record
/// buffered at that point is discarded.
pub fn frame_lines<S, E>(chunks: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    async_stream::stream! {
        let mut chunks = Box::pin(chunks);
        let mut framer = EventFramer::new();

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(bytes) => {
                    for record in framer.push(&bytes) {
                        yield Ok(record);
                    }
                }
                Err(e) => {
                    debug!(pending = framer.pending(), "Stream failed mid-record");
                    yield Err(e);
                    return;
                }
            }
        }

        if let Some(record) = framer.finish() {
            yield Ok(record);
        }
    }
}

/// Parse framed records into thought events.
///
/// Records that fail to parse are reported on the log and dropped; they never
/// abort the stream.
pub fn parse_events<S, E>(records: S) -> impl Stream<Item = Result<ThoughtEvent, E>>
where
    S: Stream<Item = Result<String, E>>,
{
    records.filter_map(|record| async move {
        match record {
            Ok(line) => match ThoughtEvent::parse(&line) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    warn!(record = %line, error = %e, "Dropping unparseable thought record");
                    None
                }
            },
            Err(e) => Some(Err(e)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StepKind;
    use futures::stream;

    const INPUT: &str = concat!(
        "{\"step\":\"start\",\"data\":\"Menerima pertanyaan\"}\n",
        "\n",
        "{\"step\":\"retrieved_docs\",\"data\":[{\"source\":\"Dok ü\",\"content\":\"ß…\"}]}\n",
        "   \n",
        "{\"step\":\"final_answer\",\"data\":\"Hasil — ok\"}"
    );

    fn frame_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut framer = EventFramer::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(framer.push(chunk));
        }
        out.extend(framer.finish());
        out
    }

    // =========================================================================
    // EventFramer Tests
    // =========================================================================

    #[test]
    fn test_single_chunk_yields_all_records() {
        let records = frame_all(&[INPUT.as_bytes()]);
        assert_eq!(records.len(), 3);
        assert!(records[0].contains("start"));
        assert!(records[2].contains("final_answer"));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let records = frame_all(&[b"\n\n  \n{\"step\":\"start\"}\n\n"]);
        assert_eq!(records, vec!["{\"step\":\"start\"}".to_string()]);
    }

    #[test]
    fn test_trailing_record_without_newline_is_flushed() {
        let mut framer = EventFramer::new();
        assert!(framer.push(b"{\"step\":\"start\"}").is_empty());
        assert_eq!(framer.pending(), 16);
        assert_eq!(framer.finish().as_deref(), Some("{\"step\":\"start\"}"));
        assert_eq!(framer.pending(), 0);
        assert!(framer.finish().is_none());
    }

    #[test]
    fn test_every_two_way_split_matches_single_chunk() {
        let bytes = INPUT.as_bytes();
        let expected = frame_all(&[bytes]);
        for split in 1..bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(frame_all(&[a, b]), expected, "split at byte {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time_matches_single_chunk() {
        let bytes = INPUT.as_bytes();
        let expected = frame_all(&[bytes]);
        let singles: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(frame_all(&singles), expected);
    }

    #[test]
    fn test_uneven_chunk_sizes_match_single_chunk() {
        let bytes = INPUT.as_bytes();
        let expected = frame_all(&[bytes]);
        for size in [2, 3, 5, 7, 11, 64] {
            let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
            assert_eq!(frame_all(&chunks), expected, "chunk size {}", size);
        }
    }

    #[test]
    fn test_split_multibyte_character_is_preserved() {
        let text = "{\"step\":\"start\",\"data\":\"ü\"}\n";
        let bytes = text.as_bytes();
        let umlaut = text.find('ü').unwrap();
        let records = frame_all(&[&bytes[..umlaut + 1], &bytes[umlaut + 1..]]);
        assert_eq!(records, vec![text.trim().to_string()]);
    }

    // =========================================================================
    // Stream Adapter Tests
    // =========================================================================

    #[tokio::test]
    async fn test_frame_lines_over_stream() {
        let chunks = vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"{\"step\":\"st")),
            Ok(Bytes::from_static(b"art\"}\n{\"step\":")),
            Ok(Bytes::from_static(b"\"final_answer\",\"data\":\"x\"}")),
        ];
        let records: Vec<_> = frame_lines(stream::iter(chunks)).collect().await;
        let records: Vec<String> = records.into_iter().map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], "{\"step\":\"start\"}");
    }

    #[tokio::test]
    async fn test_frame_lines_stops_after_transport_error() {
        let chunks = vec![
            Ok(Bytes::from_static(b"{\"step\":\"start\"}\n{\"step\":\"ret")),
            Err("connection reset"),
            Ok(Bytes::from_static(b"rieval\"}\n")),
        ];
        let items: Vec<_> = frame_lines(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_eq!(items[1], Err("connection reset"));
    }

    #[test]
    fn test_frame_lines_yields_before_stream_ends() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<Result<Bytes, std::io::Error>>();
        let mut records = tokio_test::task::spawn(frame_lines(rx));

        tx.unbounded_send(Ok(Bytes::from_static(b"{\"step\":\"start\"}\n{\"st")))
            .unwrap();
        let first = tokio_test::assert_ready!(records.poll_next());
        assert_eq!(first.unwrap().unwrap(), "{\"step\":\"start\"}");
        tokio_test::assert_pending!(records.poll_next());

        tx.unbounded_send(Ok(Bytes::from_static(b"ep\":\"retrieval\"}")))
            .unwrap();
        drop(tx);
        let second = tokio_test::assert_ready!(records.poll_next());
        assert_eq!(second.unwrap().unwrap(), "{\"step\":\"retrieval\"}");
        assert!(tokio_test::assert_ready!(records.poll_next()).is_none());
    }

    #[tokio::test]
    async fn test_parse_events_drops_bad_records() {
        let records = vec![
            Ok::<_, std::io::Error>("{\"step\":\"start\"}".to_string()),
            Ok("{broken".to_string()),
            Ok("{\"step\":\"final_answer\",\"data\":\"a\"}".to_string()),
        ];
        let events: Vec<_> = parse_events(stream::iter(records)).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().step, StepKind::Start);
        assert!(events[1].as_ref().unwrap().is_terminal());
    }
}
