use super::ScanPipeline;
use crate::domain::{RsmError, RsmResult, ScanStage};
use crate::gridding::{GridSpec, GriddedVolume};
use std::sync::{Arc, Mutex, TryLockError};

/// A [`ScanPipeline`] that several threads may hold. Only one stage call
/// runs at a time; a call made while another is in progress fails with a
/// busy error instead of waiting.
#[derive(Clone)]
pub struct SharedScanPipeline {
    inner: Arc<Mutex<ScanPipeline>>,
}

impl SharedScanPipeline {
    pub fn new(pipeline: ScanPipeline) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pipeline)),
        }
    }

    /// Runs `operation` with exclusive access to the pipeline.
    pub fn with<R>(
        &self,
        operation: impl FnOnce(&mut ScanPipeline) -> RsmResult<R>,
    ) -> RsmResult<R> {
        let mut guard = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                return Err(RsmError::busy(
                    "STATE.BUSY",
                    "another operation is running on this scan",
                ));
            }
            // state changes are single assignments; a poisoned pipeline is intact
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        operation(&mut guard)
    }

    pub fn load_raw(&self) -> RsmResult<()> {
        self.with(ScanPipeline::load_raw)
    }

    pub fn map(&self) -> RsmResult<()> {
        self.with(ScanPipeline::map)
    }

    pub fn grid(&self) -> RsmResult<Arc<GriddedVolume>> {
        self.with(ScanPipeline::grid)
    }

    pub fn set_grid_parameters(&self, parts: [(f64, f64, usize); 3]) -> RsmResult<GridSpec> {
        self.with(|pipeline| pipeline.set_grid_parameters(parts))
    }

    pub fn reset_grid_parameters(&self) -> RsmResult<GridSpec> {
        self.with(ScanPipeline::reset_grid_parameters)
    }

    pub fn stage(&self) -> RsmResult<ScanStage> {
        self.with(|pipeline| Ok(pipeline.stage()))
    }
}

#[cfg(test)]
mod tests {
    use super::SharedScanPipeline;
    use crate::common::PipelineConfig;
    use crate::domain::{RsmErrorKind, ScanStage};
    use crate::pipeline::tests::{THREE_POINT_LOG, build_pipeline};
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn nested_calls_are_rejected_as_busy() {
        let temp = TempDir::new().expect("tempdir should be created");
        let shared =
            SharedScanPipeline::new(build_pipeline(&temp, THREE_POINT_LOG, PipelineConfig::default()));
        let other = shared.clone();

        let outcome = shared.with(|pipeline| {
            pipeline.load_raw()?;
            Ok(other.map())
        });
        let error = outcome
            .expect("outer call succeeds")
            .expect_err("inner call finds the pipeline busy");
        assert_eq!(error.kind(), RsmErrorKind::Busy);
        assert_eq!(error.exit_code(), 5);
        assert_eq!(shared.stage().expect("lock is free"), ScanStage::RawLoaded);
    }

    #[test]
    fn calls_from_other_threads_run_when_idle() {
        let temp = TempDir::new().expect("tempdir should be created");
        let shared =
            SharedScanPipeline::new(build_pipeline(&temp, THREE_POINT_LOG, PipelineConfig::default()));
        shared.load_raw().expect("raw load succeeds");

        let worker = shared.clone();
        let handle = thread::spawn(move || worker.map());
        handle
            .join()
            .expect("worker thread should not panic")
            .expect("mapping succeeds");

        shared.grid().expect("gridding succeeds");
        assert_eq!(shared.stage().expect("lock is free"), ScanStage::Gridded);
    }
}
