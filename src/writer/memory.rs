use std::sync::Arc;

use crate::foundation::error::MontageResult;
use crate::frame::frame::Frame;
use crate::writer::{Writer, WriterConfig, ensure_writer_open};

/// In-memory writer for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemoryWriter {
    config: Option<WriterConfig>,
    open: bool,
    /// Frames in write order.
    pub frames: Vec<Arc<Frame>>,
}

impl InMemoryWriter {
    /// Empty, closed writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration passed to the last `open`.
    pub fn config(&self) -> Option<&WriterConfig> {
        self.config.as_ref()
    }

    /// Frame numbers in write order.
    pub fn numbers(&self) -> Vec<u64> {
        self.frames.iter().map(|f| f.number).collect()
    }
}

impl Writer for InMemoryWriter {
    fn open(&mut self, config: WriterConfig) -> MontageResult<()> {
        config.validate()?;
        self.config = Some(config);
        self.frames.clear();
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write_frame(&mut self, frame: &Arc<Frame>) -> MontageResult<()> {
        ensure_writer_open(self.open, "InMemoryWriter")?;
        self.frames.push(Arc::clone(frame));
        Ok(())
    }

    fn close(&mut self) -> MontageResult<()> {
        self.open = false;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/writer/memory.rs"]
mod tests;
