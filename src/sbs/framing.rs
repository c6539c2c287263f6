//! Partial-frame reassembly for a byte stream split arbitrarily across TCP
//! reads.
//!
//! The decoder on the other end writes `\n`-terminated lines but makes no
//! guarantee about where read() boundaries fall relative to those lines.
//! `LineFramer` accumulates bytes across calls to [`LineFramer::push`] and
//! yields only complete lines, holding back a trailing partial segment for
//! the next call.

/// Accumulates bytes from successive socket reads and yields complete lines.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed a chunk of freshly-read bytes and return every complete line it
    /// completed, in order. A line that has no trailing `\n` yet is retained
    /// in the internal buffer and will be part of a future call's output.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        loop {
            let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line_bytes: Vec<u8> = self.buffer.drain(..=pos).collect();
            // Drop the trailing '\n' (and a preceding '\r' if present).
            let mut end = line_bytes.len() - 1;
            if end > 0 && line_bytes[end - 1] == b'\r' {
                end -= 1;
            }
            let line = String::from_utf8_lossy(&line_bytes[..end]).into_owned();
            lines.push(line);
        }
        lines
    }

    /// Bytes currently held back as an incomplete trailing segment.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_nothing_for_partial_line() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"MSG,3,1,1,A1").is_empty());
        assert_eq!(framer.pending_len(), 12);
    }

    #[test]
    fn yields_line_once_terminator_arrives() {
        let mut framer = LineFramer::new();
        framer.push(b"MSG,3,1,1,A1");
        let lines = framer.push(b"2F52\n");
        assert_eq!(lines, vec!["MSG,3,1,1,A12F52".to_string()]);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn yields_multiple_lines_in_one_chunk() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"MSG,1\nMSG,2\nMSG,3");
        assert_eq!(lines, vec!["MSG,1".to_string(), "MSG,2".to_string()]);
        assert_eq!(framer.pending_len(), 5);
    }

    #[test]
    fn strips_trailing_carriage_return() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"MSG,1\r\n");
        assert_eq!(lines, vec!["MSG,1".to_string()]);
    }

    // Property 1: for every byte stream split arbitrarily into recv chunks,
    // the set of complete lines delivered equals the `\n`-delimited segments
    // of the concatenation, minus the final (possibly partial) segment.
    fn reassembles_correctly_for_split(data: &[u8], split_points: &[usize]) {
        let mut framer = LineFramer::new();
        let mut got = Vec::new();
        let mut start = 0usize;
        let mut points: Vec<usize> = split_points
            .iter()
            .map(|p| p % (data.len() + 1))
            .collect();
        points.sort_unstable();
        points.push(data.len());

        for &p in &points {
            if p < start {
                continue;
            }
            got.extend(framer.push(&data[start..p]));
            start = p;
        }

        let text = String::from_utf8_lossy(data);
        let mut expected: Vec<&str> = text.split('\n').collect();
        // Drop the final (possibly partial) segment.
        expected.pop();
        let expected: Vec<String> = expected
            .into_iter()
            .map(|s| s.trim_end_matches('\r').to_string())
            .collect();

        assert_eq!(got, expected);
    }

    #[test]
    fn reassembles_across_arbitrary_splits() {
        let data = b"MSG,1,a,b\nMSG,2,c,d\nMSG,3,e,f\npartial-tail";
        reassembles_correctly_for_split(data, &[3, 11, 11, 25, 1, 40]);
        reassembles_correctly_for_split(data, &[]);
        reassembles_correctly_for_split(data, &[data.len()]);
        for i in 0..data.len() {
            reassembles_correctly_for_split(data, &[i]);
        }
    }

    proptest::proptest! {
        #[test]
        fn reassembles_for_any_split(
            lines in proptest::collection::vec("[a-zA-Z0-9,]{0,20}", 0..8),
            splits in proptest::collection::vec(0usize..200, 0..10),
        ) {
            let data = lines.join("\n").into_bytes();
            let mut data = data;
            data.push(b'\n'); // ensure at least one full line boundary exists
            reassembles_correctly_for_split(&data, &splits);
        }
    }
}
