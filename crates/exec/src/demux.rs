//! Docker attach-stream demultiplexing.
//!
//! When a container runs without a TTY, the runtime multiplexes stdout
//! and stderr over one connection. Each frame starts with an 8-byte
//! header `[stream_type, 0, 0, 0, size_be32]` followed by `size` payload
//! bytes. This decoder concatenates all payloads in arrival order and
//! tolerates a truncated trailing frame (returns what was read).

/// Stream type byte of a frame header. 0 = stdin, 1 = stdout, 2 = stderr.
const STDOUT: u8 = 1;
const STDERR: u8 = 2;

const HEADER_LEN: usize = 8;

/// True when `data` starts with a plausible multiplex frame header.
///
/// Plain (TTY or already-demuxed) output has no such framing; callers
/// use this to decide whether decoding applies at all.
pub fn looks_framed(data: &[u8]) -> bool {
    if data.len() < HEADER_LEN {
        return false;
    }
    let stream_type = data[0];
    let padding_ok = data[1] == 0 && data[2] == 0 && data[3] == 0;
    let size = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
    matches!(stream_type, 0 | STDOUT | STDERR) && padding_ok && size <= data.len()
}

/// Decode a multiplexed stream into combined output.
///
/// Frames are concatenated in arrival order, interleaving stdout and
/// stderr exactly as the tools produced them. A truncated trailing
/// frame contributes whatever payload bytes were read.
pub fn decode(data: &[u8]) -> String {
    let mut combined = Vec::with_capacity(data.len());
    let mut pos = 0;

    while pos + HEADER_LEN <= data.len() {
        let size = u32::from_be_bytes([
            data[pos + 4],
            data[pos + 5],
            data[pos + 6],
            data[pos + 7],
        ]) as usize;
        let payload_start = pos + HEADER_LEN;
        let payload_end = (payload_start + size).min(data.len());
        combined.extend_from_slice(&data[payload_start..payload_end]);
        pos = payload_start + size;
    }

    // Header itself truncated: nothing more to read.
    String::from_utf8_lossy(&combined).into_owned()
}

/// Decode framed output; pass through unframed data untouched.
pub fn decode_if_framed(data: &[u8]) -> String {
    if looks_framed(data) {
        decode(data)
    } else {
        String::from_utf8_lossy(data).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(stream_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut f = vec![stream_type, 0, 0, 0];
        f.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        f.extend_from_slice(payload);
        f
    }

    #[test]
    fn decodes_single_stdout_frame() {
        let data = frame(STDOUT, b"hello\n");
        assert!(looks_framed(&data));
        assert_eq!(decode(&data), "hello\n");
    }

    #[test]
    fn interleaves_stdout_and_stderr_in_order() {
        let mut data = frame(STDOUT, b"ok: 1\n");
        data.extend(frame(STDERR, b"warn: x\n"));
        data.extend(frame(STDOUT, b"ok: 2\n"));
        assert_eq!(decode(&data), "ok: 1\nwarn: x\nok: 2\n");
    }

    #[test]
    fn tolerates_truncated_trailing_payload() {
        let mut data = frame(STDOUT, b"complete\n");
        // Header claims 100 bytes but only 4 arrive.
        data.extend([STDOUT, 0, 0, 0]);
        data.extend(100u32.to_be_bytes());
        data.extend_from_slice(b"part");
        assert_eq!(decode(&data), "complete\npart");
    }

    #[test]
    fn tolerates_truncated_trailing_header() {
        let mut data = frame(STDERR, b"boom\n");
        data.extend([STDOUT, 0, 0]); // incomplete header
        assert_eq!(decode(&data), "boom\n");
    }

    #[test]
    fn plain_output_is_not_framed() {
        assert!(!looks_framed(b"plain text output\n"));
        assert_eq!(decode_if_framed(b"plain text\n"), "plain text\n");
    }

    #[test]
    fn empty_input() {
        assert!(!looks_framed(b""));
        assert_eq!(decode(b""), "");
    }

    #[test]
    fn header_with_nonzero_padding_rejected() {
        let mut data = vec![STDOUT, 9, 0, 0];
        data.extend(4u32.to_be_bytes());
        data.extend_from_slice(b"text");
        assert!(!looks_framed(&data));
    }

    #[test]
    fn decode_if_framed_decodes_frames() {
        let data = frame(STDOUT, b"framed");
        assert_eq!(decode_if_framed(&data), "framed");
    }
}
