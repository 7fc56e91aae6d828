//! Framing: start marker, body bytes, end marker. Body bytes are not escaped.

/// First byte of every frame.
pub const FRAME_START: u8 = 0xFD;
/// Last byte of every frame.
pub const FRAME_END: u8 = 0xFE;

/// Reassembly cap on a frame body. A frame that grows past this is
/// terminated as if the end marker had been seen.
pub const MAX_FRAME_BODY: usize = 198;

/// Wrap a message body (opcode + payload) in the frame markers.
pub fn encode_frame(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 2);
    out.push(FRAME_START);
    out.extend_from_slice(body);
    out.push(FRAME_END);
    out
}

/// Incremental frame reassembler for a byte stream.
///
/// Bytes outside a frame are discarded; a start marker inside a frame
/// restarts it. Because body bytes are not escaped, a body byte equal to a
/// marker value desynchronizes framing — that is the wire contract, kept
/// as-is (see the module tests).
#[derive(Debug, Default)]
pub struct FrameReassembler {
    buf: Vec<u8>,
    in_frame: bool,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns the completed frame body when this byte ends one.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        if byte == FRAME_START {
            self.buf.clear();
            self.in_frame = true;
            return None;
        }
        if !self.in_frame {
            return None;
        }
        if byte == FRAME_END {
            self.in_frame = false;
            return Some(std::mem::take(&mut self.buf));
        }
        self.buf.push(byte);
        if self.buf.len() >= MAX_FRAME_BODY {
            self.in_frame = false;
            return Some(std::mem::take(&mut self.buf));
        }
        None
    }

    /// Feed a chunk; returns every frame body completed within it.
    pub fn drain(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        for &b in bytes {
            if let Some(frame) = self.push(b) {
                out.push(frame);
            }
        }
        out
    }
}
