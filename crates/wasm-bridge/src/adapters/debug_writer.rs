//! Line-buffered sink for contract debug output.

use crate::domain::context::ContextId;
use std::io::{self, Write};
use tracing::debug;

/// Buffer size that forces a flush without a newline.
pub const DEBUG_FLUSH_THRESHOLD: usize = 1024;

/// Turns contract writes into `tracing::debug!` lines tagged with the
/// contract and context id.
///
/// A line is emitted per newline, or once 1024 bytes are buffered.
#[derive(Debug)]
pub struct DebugWriter {
    contract: String,
    ctx_id: ContextId,
    buf: Vec<u8>,
}

impl DebugWriter {
    /// Writer for one instance.
    #[must_use]
    pub fn new(contract: &str, ctx_id: ContextId) -> Self {
        Self {
            contract: contract.to_string(),
            ctx_id,
            buf: Vec::new(),
        }
    }

    fn push(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let take = (DEBUG_FLUSH_THRESHOLD - self.buf.len()).min(bytes.len());
            self.buf.extend_from_slice(&bytes[..take]);
            if self.buf.len() >= DEBUG_FLUSH_THRESHOLD {
                self.emit();
            }
            bytes = &bytes[take..];
        }
    }

    fn emit(&mut self) {
        debug!(
            contract = %self.contract,
            ctxid = %self.ctx_id,
            "{}",
            String::from_utf8_lossy(&self.buf)
        );
        self.buf.clear();
    }
}

impl Write for DebugWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while let Some(idx) = rest.iter().position(|b| *b == b'\n') {
            self.push(&rest[..idx]);
            self.emit();
            rest = &rest[idx + 1..];
        }
        self.push(rest);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.emit();
        }
        Ok(())
    }
}

impl Drop for DebugWriter {
    fn drop(&mut self) {
        if !self.buf.is_empty() {
            self.emit();
        }
    }
}
