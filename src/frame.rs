//! Frame codec: `payload || '.' || extension`, protected by Reed-Solomon.
//!
//! # Block structure
//! The message is cut into runs of `255 - P` bytes; each run is followed by
//! its own `P` parity bytes, forming one systematic codeword over GF(256)
//! (primitive polynomial 0x11d, generator 2, first consecutive root 0).  The
//! last codeword is shortened when the message does not fill it.
//!
//! ```text
//! [ msg 205 | parity 50 ][ msg 205 | parity 50 ] ... [ msg k | parity 50 ]
//! ```
//!
//! Each codeword corrects up to `P / 2` corrupted bytes independently.

use reed_solomon::{Decoder, Encoder};
use tracing::debug;

use crate::error::{Error, Result};
use crate::layout::{Layout, RS_BLOCK_LEN, SEPARATOR};

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload:   Vec<u8>,
    pub extension: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    layout: Layout,
}

impl FrameCodec {
    pub fn new(layout: &Layout) -> Self {
        Self { layout: *layout }
    }

    pub fn encode(&self, payload: &[u8], extension: &[u8]) -> Vec<u8> {
        let mut message = Vec::with_capacity(payload.len() + 1 + extension.len());
        message.extend_from_slice(payload);
        message.push(SEPARATOR);
        message.extend_from_slice(extension);

        let encoder = Encoder::new(self.layout.parity_bytes());
        let mut framed = Vec::with_capacity(self.layout.framed_len(message.len()));
        for run in message.chunks(self.layout.rs_message_len()) {
            let codeword = encoder.encode(run);
            framed.extend_from_slice(&codeword[..]);
        }
        framed
    }

    pub fn decode(&self, framed: &[u8]) -> Result<Frame> {
        let parity = self.layout.parity_bytes();
        let decoder = Decoder::new(parity);
        let mut message = Vec::with_capacity(framed.len());

        for (block, codeword) in framed.chunks(RS_BLOCK_LEN).enumerate() {
            // A codeword must hold at least one message byte.
            if codeword.len() <= parity {
                return Err(Error::Uncorrectable { block });
            }
            let mut buf = codeword.to_vec();
            let corrected = decoder
                .correct(&mut buf[..], None)
                .map_err(|_| Error::Uncorrectable { block })?;
            if corrected.data() != &codeword[..codeword.len() - parity] {
                debug!(block, "repaired corrupted frame block");
            }
            message.extend_from_slice(corrected.data());
        }

        let split = message
            .iter()
            .rposition(|&b| b == SEPARATOR)
            .ok_or_else(|| Error::MalformedFrame("no extension separator".into()))?;
        let extension = message.split_off(split + 1);
        message.truncate(split);

        Ok(Frame { payload: message, extension })
    }
}
