use crate::domain::destination::select_destination;
use crate::domain::encode::{encode_segment, probe_duration};
use crate::domain::error::JobError;
use crate::domain::jobs::{Job, JobReport, SegmentDescriptor, UploadRecord};
use crate::domain::plan::plan;
use crate::ports::codec::CodecTool;
use crate::ports::source::SourceFetcher;
use crate::ports::storage::DestinationStore;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{info, warn};
use uuid::Uuid;

/// Service-wide knobs that apply to every job.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Parent directory of the per-job scratch directories.
    pub scratch_root: PathBuf,
    /// Hard ceiling on segments per job. The only bound on a job whose
    /// source duration could not be probed.
    pub max_segments: usize,
    /// Pause after each successful upload.
    pub upload_pause: Duration,
}

/// Splits a source asset into overlapping segments and distributes them
/// across capped destination subfolders.
///
/// Jobs run one segment at a time: each placement decision depends on the
/// folder counts left by the previous upload.
pub struct SplitUploadService<C, F> {
    codec: C,
    fetcher: F,
    settings: PipelineSettings,
}

impl<C, F> SplitUploadService<C, F>
where
    C: CodecTool,
    F: SourceFetcher,
{
    pub fn new(codec: C, fetcher: F, settings: PipelineSettings) -> Self {
        Self {
            codec,
            fetcher,
            settings,
        }
    }

    /// Run `job` to completion, uploading through `store`.
    ///
    /// Any fatal error aborts the job and drops the records collected so
    /// far. Uploads that already went through stay in place. The scratch
    /// directory is removed on every exit path.
    pub async fn run<S>(&self, job: &Job, store: &S) -> Result<JobReport, JobError>
    where
        S: DestinationStore + ?Sized,
    {
        let work_id = Uuid::new_v4().simple().to_string();
        tokio::fs::create_dir_all(&self.settings.scratch_root).await?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("splits_{}", work_id))
            .tempdir_in(&self.settings.scratch_root)?;

        info!(
            "Job {} started: {} -> {} ({}s segments, {}s overlap, {})",
            work_id, job.source_url, job.dest_root, job.segment_seconds, job.overlap_seconds, job.format
        );

        let mut uploaded = Vec::new();
        let outcome = self
            .run_in(job, store, scratch.path(), &work_id, &mut uploaded)
            .await;

        cleanup(scratch);

        match outcome {
            Ok(()) => {
                info!("Job {} finished: {} segments uploaded", work_id, uploaded.len());
                Ok(JobReport::success(job, uploaded))
            }
            Err(e) => {
                if !uploaded.is_empty() {
                    let paths: Vec<&str> = uploaded.iter().map(|r| r.dest.as_str()).collect();
                    warn!(
                        "Job {} aborted after {} uploads that remain in place: {:?}",
                        work_id,
                        uploaded.len(),
                        paths
                    );
                }
                warn!("Job {} failed ({}): {}", work_id, e.category(), e);
                Err(e)
            }
        }
    }

    async fn run_in<S>(
        &self,
        job: &Job,
        store: &S,
        scratch: &Path,
        work_id: &str,
        uploaded: &mut Vec<UploadRecord>,
    ) -> Result<(), JobError>
    where
        S: DestinationStore + ?Sized,
    {
        let source = scratch.join(format!("in_{}", work_id));
        self.fetcher
            .fetch(&job.source_url, &source)
            .await
            .map_err(|e| JobError::Acquisition {
                url: job.source_url.clone(),
                detail: e.to_string(),
            })?;

        let duration = probe_duration(&self.codec, &source).await;
        match duration {
            Some(d) => info!("Job {} source is {:.3}s long", work_id, d),
            None => warn!(
                "Job {} source duration unknown, bounded by {} segments",
                work_id, self.settings.max_segments
            ),
        }

        let segments = plan(
            duration,
            job.segment_seconds as f64,
            job.overlap_seconds as f64,
        )
        .take(self.settings.max_segments);

        for descriptor in segments {
            let record = self
                .process_segment(job, store, &source, scratch, &descriptor)
                .await?;
            uploaded.push(record);
            if !self.settings.upload_pause.is_zero() {
                tokio::time::sleep(self.settings.upload_pause).await;
            }
        }
        Ok(())
    }

    async fn process_segment<S>(
        &self,
        job: &Job,
        store: &S,
        source: &Path,
        scratch: &Path,
        descriptor: &SegmentDescriptor,
    ) -> Result<UploadRecord, JobError>
    where
        S: DestinationStore + ?Sized,
    {
        let local = encode_segment(&self.codec, source, descriptor, &job.format, scratch)
            .await
            .map_err(|e| JobError::Encode {
                sequence: e.sequence,
                detail: e.detail,
            })?;

        let folder = select_destination(store, &job.dest_root, job.max_dirs, job.max_files_per_dir)
            .await
            .ok_or_else(|| JobError::DestinationExhausted {
                dest_root: job.dest_root.clone(),
            })?;

        let content = tokio::fs::read(&local).await?;
        let size = content.len() as u64;
        let dest = job.segment_dest(&folder.path, descriptor.sequence);

        let stored = store
            .upload(&dest, content)
            .await
            .map_err(|e| JobError::Upload {
                path: dest.clone(),
                detail: e.to_string(),
            })?;
        info!(
            "Segment {} [{:.3}s +{:.3}s] uploaded to {} ({} bytes)",
            descriptor.sequence, descriptor.start, descriptor.length, stored.path, size
        );

        if let Err(e) = tokio::fs::remove_file(&local).await {
            warn!("Could not remove {:?}: {}", local, e);
        }

        Ok(UploadRecord { dest, size })
    }
}

fn cleanup(scratch: TempDir) {
    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        warn!("Could not remove scratch directory {:?}: {}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fs::FsStore;
    use crate::domain::jobs::JobRequest;
    use crate::ports::codec::MockCodecTool;
    use crate::ports::source::{FetchError, MockSourceFetcher};
    use crate::ports::storage::{MockDestinationStore, RemoteEntry, StorageError};
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn output(stdout: &str, stderr: &str, success: bool) -> Output {
        Output {
            status: ExitStatus::from_raw(if success { 0 } else { 1 << 8 }),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    fn job(dest_root: &str, max_dirs: u32, max_per: u32) -> Job {
        let request = JobRequest {
            url: Some("https://www.dropbox.com/s/abc/talk.wav?dl=0".into()),
            dropbox_token: Some("t".into()),
            dest_root: Some(dest_root.into()),
            group_prefix: Some("ep".into()),
            max_dirs: Some(max_dirs),
            max_files_per_dir: Some(max_per),
            ..Default::default()
        };
        request.into_job().unwrap().0
    }

    fn fetcher() -> MockSourceFetcher {
        let mut fetcher = MockSourceFetcher::new();
        fetcher.expect_fetch().returning(|_, path| {
            std::fs::write(path, b"source-bytes").unwrap();
            Ok(12)
        });
        fetcher
    }

    /// Codec whose stream copy always works and writes `bytes` per segment.
    fn copying_codec(duration: &'static str) -> MockCodecTool {
        let mut codec = MockCodecTool::new();
        codec
            .expect_probe_duration()
            .returning(move |_| Ok(output(duration, "", !duration.is_empty())));
        codec.expect_extract_copy().returning(|_, _, _, out| {
            std::fs::write(out, b"segment").unwrap();
            Ok(output("", "", true))
        });
        codec.expect_extract_reencode().times(0);
        codec
    }

    fn settings(scratch: &Path) -> PipelineSettings {
        PipelineSettings {
            scratch_root: scratch.to_path_buf(),
            max_segments: 1000,
            upload_pause: Duration::ZERO,
        }
    }

    fn scratch_is_empty(scratch: &Path) -> bool {
        std::fs::read_dir(scratch).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn segments_fill_lowest_folders_first() {
        let scratch = tempdir().unwrap();
        let remote = tempdir().unwrap();
        let store = FsStore::new(remote.path());
        let service = SplitUploadService::new(copying_codec("1000.0\n"), fetcher(), settings(scratch.path()));

        let report = service.run(&job("/test/wav", 5, 2), &store).await.unwrap();

        assert_eq!(report.status, "success");
        assert_eq!(report.group_prefix, "ep");
        assert_eq!(report.uploaded_count, 3);
        let dests: Vec<_> = report.uploaded.iter().map(|r| r.dest.as_str()).collect();
        assert_eq!(
            dests,
            vec![
                "/test/wav/01/ep-001.wav",
                "/test/wav/01/ep-002.wav",
                "/test/wav/02/ep-003.wav",
            ]
        );
        assert!(report.uploaded.iter().all(|r| r.size == 7));
        assert!(remote.path().join("test/wav/02/ep-003.wav").exists());
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn planned_windows_reach_the_codec() {
        let scratch = tempdir().unwrap();
        let remote = tempdir().unwrap();
        let starts = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut codec = MockCodecTool::new();
        codec
            .expect_probe_duration()
            .returning(|_| Ok(output("1000\n", "", true)));
        let seen = starts.clone();
        codec.expect_extract_copy().returning(move |_, start, length, out| {
            seen.lock().unwrap().push((start, length));
            std::fs::write(out, b"segment").unwrap();
            Ok(output("", "", true))
        });

        let service = SplitUploadService::new(codec, fetcher(), settings(scratch.path()));
        service
            .run(&job("/r", 5, 5), &FsStore::new(remote.path()))
            .await
            .unwrap();

        assert_eq!(
            *starts.lock().unwrap(),
            vec![(0.0, 400.0), (390.0, 400.0), (780.0, 220.0)]
        );
    }

    #[tokio::test]
    async fn unknown_duration_stops_at_the_ceiling() {
        let scratch = tempdir().unwrap();
        let remote = tempdir().unwrap();
        let mut settings = settings(scratch.path());
        settings.max_segments = 4;
        let service = SplitUploadService::new(copying_codec(""), fetcher(), settings);

        let report = service
            .run(&job("/r", 10, 10), &FsStore::new(remote.path()))
            .await
            .unwrap();
        assert_eq!(report.uploaded_count, 4);
    }

    #[tokio::test]
    async fn exhausted_destinations_abort_without_uploading() {
        let scratch = tempdir().unwrap();
        let mut store = MockDestinationStore::new();
        store
            .expect_list_folder()
            .times(2)
            .returning(|_| Ok(vec![RemoteEntry::file("x.wav")]));
        store.expect_upload().times(0);

        let service = SplitUploadService::new(copying_codec("1000\n"), fetcher(), settings(scratch.path()));
        let err = service.run(&job("/full", 2, 1), &store).await.unwrap_err();

        assert!(matches!(err, JobError::DestinationExhausted { ref dest_root } if dest_root == "/full"));
        assert_eq!(err.category(), "destination_exhausted");
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn exhaustion_mid_job_discards_earlier_records() {
        let scratch = tempdir().unwrap();
        let remote = tempdir().unwrap();
        let store = FsStore::new(remote.path());
        let service = SplitUploadService::new(copying_codec("1000\n"), fetcher(), settings(scratch.path()));

        // Two folders of one file each hold only two of the three segments.
        let err = service.run(&job("/tight", 2, 1), &store).await.unwrap_err();

        assert!(matches!(err, JobError::DestinationExhausted { .. }));
        assert!(remote.path().join("tight/01/ep-001.wav").exists());
        assert!(remote.path().join("tight/02/ep-002.wav").exists());
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn failed_fallback_reports_encode_error() {
        let scratch = tempdir().unwrap();
        let mut codec = MockCodecTool::new();
        codec
            .expect_probe_duration()
            .returning(|_| Ok(output("1000\n", "", true)));
        codec
            .expect_extract_copy()
            .times(1)
            .returning(|_, _, _, _| Ok(output("", "copy refused", false)));
        codec
            .expect_extract_reencode()
            .withf(|_, _, _, codec, _| codec.encoder() == "pcm_s16le")
            .times(1)
            .returning(|_, _, _, _, _| Ok(output("", &"E".repeat(9000), false)));
        let mut store = MockDestinationStore::new();
        store.expect_list_folder().times(0);
        store.expect_upload().times(0);

        let service = SplitUploadService::new(codec, fetcher(), settings(scratch.path()));
        let err = service.run(&job("/r", 5, 5), &store).await.unwrap_err();

        match &err {
            JobError::Encode { sequence, detail } => {
                assert_eq!(*sequence, 1);
                assert_eq!(detail.len(), crate::domain::error::MAX_DETAIL_BYTES);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn rejected_upload_aborts_the_job() {
        let scratch = tempdir().unwrap();
        let uploads = Arc::new(AtomicUsize::new(0));
        let mut store = MockDestinationStore::new();
        store.expect_list_folder().returning(|_| Ok(vec![]));
        let counter = uploads.clone();
        store.expect_upload().returning(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Rejected {
                status: 507,
                body: "insufficient_space".into(),
            })
        });

        let service = SplitUploadService::new(copying_codec("1000\n"), fetcher(), settings(scratch.path()));
        let err = service.run(&job("/r", 5, 5), &store).await.unwrap_err();

        assert!(matches!(err, JobError::Upload { ref path, .. } if path == "/r/01/ep-001.wav"));
        assert!(err.detail().unwrap().contains("insufficient_space"));
        assert_eq!(uploads.load(Ordering::SeqCst), 1);
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn failed_fetch_aborts_before_planning() {
        let scratch = tempdir().unwrap();
        let mut fetcher = MockSourceFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|_, _| Err(FetchError::Status(404)));
        let mut codec = MockCodecTool::new();
        codec.expect_probe_duration().times(0);
        codec.expect_extract_copy().times(0);
        let store = MockDestinationStore::new();

        let service = SplitUploadService::new(codec, fetcher, settings(scratch.path()));
        let err = service.run(&job("/r", 5, 5), &store).await.unwrap_err();

        assert_eq!(err.category(), "acquisition");
        assert!(err.detail().unwrap().contains("404"));
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn zero_length_source_uploads_nothing() {
        let scratch = tempdir().unwrap();
        let mut codec = MockCodecTool::new();
        codec
            .expect_probe_duration()
            .returning(|_| Ok(output("0.000000\n", "", true)));
        codec.expect_extract_copy().times(0);
        let store = MockDestinationStore::new();

        let service = SplitUploadService::new(codec, fetcher(), settings(scratch.path()));
        let report = service.run(&job("/r", 5, 5), &store).await.unwrap();
        assert_eq!(report.uploaded_count, 0);
    }
}
