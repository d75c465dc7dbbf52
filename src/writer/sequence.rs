use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::foundation::error::{MontageError, MontageResult};
use crate::frame::frame::Frame;
use crate::writer::{Writer, WriterConfig, ensure_writer_open};

/// Writes every frame as `<prefix><number:06>.png` (straight alpha) into a directory.
///
/// Frames without image data are written as fully transparent images of the configured size.
#[derive(Debug)]
pub struct ImageSequenceWriter {
    dir: PathBuf,
    prefix: String,
    config: Option<WriterConfig>,
    written: u64,
}

impl ImageSequenceWriter {
    /// Writer targeting `dir` with the `frame_` prefix.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "frame_".to_string(),
            config: None,
            written: 0,
        }
    }

    /// Use a different file name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path written for frame `number`.
    pub fn path_for(&self, number: u64) -> PathBuf {
        self.dir.join(format!("{}{number:06}.png", self.prefix))
    }

    /// Frames written since `open`.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Writer for ImageSequenceWriter {
    fn open(&mut self, config: WriterConfig) -> MontageResult<()> {
        config.validate()?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create output dir '{}'", self.dir.display()))?;
        self.config = Some(config);
        self.written = 0;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn write_frame(&mut self, frame: &Arc<Frame>) -> MontageResult<()> {
        ensure_writer_open(self.is_open(), "ImageSequenceWriter")?;
        let (width, height, straight) = match frame.to_straight_rgba() {
            Some(img) => (frame.width(), frame.height(), img),
            None => {
                let cfg = self
                    .config
                    .as_ref()
                    .ok_or_else(|| MontageError::validation("writer is not open"))?;
                let len = cfg.width as usize * cfg.height as usize * 4;
                (cfg.width, cfg.height, vec![0u8; len])
            }
        };
        let path = self.path_for(frame.number);
        image::save_buffer_with_format(
            &path,
            &straight,
            width,
            height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        self.written += 1;
        tracing::trace!(number = frame.number, path = %path.display(), "wrote frame");
        Ok(())
    }

    fn close(&mut self) -> MontageResult<()> {
        if self.config.take().is_some() {
            tracing::debug!(frames = self.written, dir = %self.dir.display(), "closed image sequence");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/writer/sequence.rs"]
mod tests;
