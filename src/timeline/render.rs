use std::sync::Arc;

use rayon::prelude::*;

use crate::foundation::error::{MontageError, MontageResult};
use crate::frame::frame::Frame;
use crate::settings::Settings;
use crate::timeline::Timeline;
use crate::writer::Writer;

/// How a frame range is spread over worker threads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderThreading {
    /// Render chunks on a rayon pool instead of the calling thread.
    pub parallel: bool,
    /// Frames per chunk; `0` is treated as `1`.
    pub chunk_size: usize,
    /// Pool size (`None` = rayon default).
    pub threads: Option<usize>,
}

impl Default for RenderThreading {
    fn default() -> Self {
        Self {
            parallel: false,
            chunk_size: 16,
            threads: None,
        }
    }
}

impl RenderThreading {
    /// Parallel rendering sized by `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            parallel: true,
            chunk_size: settings.chunk_size,
            threads: settings.threads,
        }
    }
}

/// Counters reported by range rendering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Frames produced.
    pub frames_total: u64,
    /// Frames composited during this call.
    pub frames_rendered: u64,
    /// Frames served from the timeline cache.
    pub frames_cached: u64,
}

impl RenderStats {
    fn record(&mut self, from_cache: bool) {
        self.frames_total += 1;
        if from_cache {
            self.frames_cached += 1;
        } else {
            self.frames_rendered += 1;
        }
    }
}

fn build_thread_pool(threads: Option<usize>) -> MontageResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(MontageError::validation(
            "render threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| MontageError::validation(format!("failed to build rayon thread pool: {e}")))
}

fn normalized_chunk_size(chunk_size: usize) -> u64 {
    if chunk_size == 0 {
        1
    } else {
        chunk_size as u64
    }
}

impl Timeline {
    /// Render frames `start..=end` in order.
    pub fn render_range(
        &self,
        start: u64,
        end: u64,
        threading: &RenderThreading,
    ) -> MontageResult<(Vec<Arc<Frame>>, RenderStats)> {
        let mut out = Vec::with_capacity((end.saturating_sub(start) + 1).min(4096) as usize);
        let stats = self.for_each_chunk(start, end, threading, |frames| {
            out.extend(frames);
            Ok(())
        })?;
        Ok((out, stats))
    }

    /// Render frames `start..=end` and hand them to `writer` in order.
    ///
    /// The writer must already be open. Only one chunk of frames is held at a time.
    pub fn write_range(
        &self,
        writer: &mut dyn Writer,
        start: u64,
        end: u64,
        threading: &RenderThreading,
    ) -> MontageResult<RenderStats> {
        self.for_each_chunk(start, end, threading, |frames| {
            frames.iter().try_for_each(|f| writer.write_frame(f))
        })
    }

    fn for_each_chunk(
        &self,
        start: u64,
        end: u64,
        threading: &RenderThreading,
        mut sink: impl FnMut(Vec<Arc<Frame>>) -> MontageResult<()>,
    ) -> MontageResult<RenderStats> {
        if start < 1 || start > end {
            return Err(MontageError::validation(format!(
                "render range {start}..={end} must be non-empty and start at frame >= 1"
            )));
        }
        let chunk_size = normalized_chunk_size(threading.chunk_size);
        let pool = if threading.parallel {
            Some(build_thread_pool(threading.threads)?)
        } else {
            None
        };

        let mut stats = RenderStats::default();
        let mut chunk_start = start;
        while chunk_start <= end {
            let chunk_end = (chunk_start + chunk_size - 1).min(end);
            let fetched: Vec<MontageResult<(Arc<Frame>, bool)>> = match &pool {
                Some(pool) => pool.install(|| {
                    (chunk_start..=chunk_end)
                        .into_par_iter()
                        .map(|n| self.fetch(n))
                        .collect()
                }),
                None => (chunk_start..=chunk_end).map(|n| self.fetch(n)).collect(),
            };
            let mut frames = Vec::with_capacity(fetched.len());
            for item in fetched {
                let (frame, from_cache) = item?;
                stats.record(from_cache);
                frames.push(frame);
            }
            tracing::debug!(chunk_start, chunk_end, "rendered chunk");
            sink(frames)?;
            chunk_start = chunk_end + 1;
        }
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/render.rs"]
mod tests;
