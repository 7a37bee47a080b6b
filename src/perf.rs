//! Feature-gated stage timing for the render pipeline.
//!
//! With `--features perf` each stage logs its wall time as a `tracing`
//! event with target="perf"; without the feature the timers compile to
//! nothing.

#[cfg(feature = "perf")]
use std::time::Instant;

/// Render pipeline stages timed separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Request,
    FetchCreative,
    Compose,
    EncodePng,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Request => "render.request",
            Stage::FetchCreative => "render.fetch_creative",
            Stage::Compose => "render.compose",
            Stage::EncodePng => "render.encode_png",
        }
    }
}

#[cfg(feature = "perf")]
pub struct StageTimer {
    stage: Stage,
    start: Instant,
}

#[cfg(feature = "perf")]
impl StageTimer {
    #[inline]
    pub fn start(stage: Stage) -> Self {
        Self {
            stage,
            start: Instant::now(),
        }
    }
}

#[cfg(feature = "perf")]
impl Drop for StageTimer {
    fn drop(&mut self) {
        let ms = self.start.elapsed().as_secs_f64() * 1000.0;
        tracing::info!(target: "perf", stage = self.stage.name(), ms = ms);
    }
}

#[cfg(not(feature = "perf"))]
pub struct StageTimer;

#[cfg(not(feature = "perf"))]
impl StageTimer {
    #[inline]
    pub fn start(_stage: Stage) -> Self {
        StageTimer
    }
}
