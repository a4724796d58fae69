//! Queue processor tests with a real SQLite store and faked assembly/upload
//! boundaries.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::{Mutex, Notify};

use mixdown::{AssembledProgram, MixdownError, SegmentDescriptor};
use radiogen::database::models::{JobDbModel, JobStatus, ProgramType};
use radiogen::database::repositories::{JobRepository, SqlxJobRepository};
use radiogen::database::{init_pool, run_migrations};
use radiogen::services::{Assembler, JobSelector, ProcessOutcome, QueueProcessor};
use radiogen::storage::ProgramStore;
use radiogen::{Error, Result};

const SEGMENTS: &str = r#"[
    {"type": "intro", "duration": 3.0},
    {"type": "single", "url": "https://cdn.example.com/audio/intro.mp3"}
]"#;

async fn setup_repo() -> (TempDir, Arc<SqlxJobRepository>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("jobs.db").display());
    let pool = init_pool(&url).await.expect("pool");
    run_migrations(&pool).await.expect("migrations");
    (dir, Arc::new(SqlxJobRepository::new(pool)))
}

fn make_job() -> JobDbModel {
    JobDbModel::new(ProgramType::Kids, "spookyland", "32", "en", SEGMENTS)
}

/// Renders a tiny placeholder program without touching ffmpeg or the network.
struct FakeAssembler {
    file_count: usize,
    /// When set, block until notified before finishing (for busy-flag tests).
    hold: Option<Arc<Notify>>,
}

impl FakeAssembler {
    fn new(file_count: usize) -> Self {
        Self {
            file_count,
            hold: None,
        }
    }
}

#[async_trait]
impl Assembler for FakeAssembler {
    async fn assemble(
        &self,
        _segments: &[SegmentDescriptor],
        output_name: &str,
    ) -> mixdown::Result<AssembledProgram> {
        if let Some(hold) = &self.hold {
            hold.notified().await;
        }
        let scratch = tempfile::tempdir()?;
        let path = scratch.path().join(output_name);
        tokio::fs::write(&path, b"ID3 fake program bytes").await?;
        Ok(AssembledProgram::new(scratch, path, self.file_count))
    }
}

/// Always fails, standing in for an unreachable recording.
struct FailingAssembler;

#[async_trait]
impl Assembler for FailingAssembler {
    async fn assemble(
        &self,
        _segments: &[SegmentDescriptor],
        _output_name: &str,
    ) -> mixdown::Result<AssembledProgram> {
        Err(MixdownError::missing_recording(
            "https://cdn.example.com/audio/answer-qid9.mp3",
            "download failed: connection refused",
        ))
    }
}

/// Records uploads in memory and returns a CDN-shaped URL.
#[derive(Default)]
struct FakeStore {
    uploads: Mutex<Vec<(String, usize)>>,
    fail: bool,
}

#[async_trait]
impl ProgramStore for FakeStore {
    async fn store(
        &self,
        bytes: Vec<u8>,
        lang: &str,
        lmid: &str,
        world: &str,
        filename: &str,
    ) -> Result<String> {
        if self.fail {
            return Err(Error::upload("storage returned 401"));
        }
        let path = format!("{lang}/{lmid}/{world}/{filename}");
        self.uploads.lock().await.push((path.clone(), bytes.len()));
        Ok(format!("https://cdn.example.com/{path}"))
    }
}

#[tokio::test]
async fn successful_run_completes_the_job() {
    let (_dir, repo) = setup_repo().await;
    let store = Arc::new(FakeStore::default());
    let processor = QueueProcessor::new(
        repo.clone(),
        store.clone(),
        Arc::new(FakeAssembler::new(2)),
        10,
    );

    let job = make_job();
    repo.create_job(&job).await.unwrap();

    let outcome = processor.process(JobSelector::OldestPending).await.unwrap();
    let ProcessOutcome::Completed {
        job_id,
        program_url,
        file_count,
        ..
    } = outcome
    else {
        panic!("expected Completed, got {outcome:?}");
    };
    assert_eq!(job_id, job.id);
    assert_eq!(program_url, "https://cdn.example.com/en/32/spookyland/kids-program.mp3");
    assert_eq!(file_count, 2);

    let stored = repo.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.parsed_status(), Some(JobStatus::Completed));
    assert_eq!(stored.program_url.as_deref(), Some(program_url.as_str()));
    assert_eq!(stored.file_count, Some(2));
    assert!(stored.error_message.is_none());
    assert!(stored.processing_duration_ms.is_some());

    let uploads = store.uploads.lock().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "en/32/spookyland/kids-program.mp3");
    assert!(uploads[0].1 > 0);
}

#[tokio::test]
async fn assembly_failure_marks_the_job_failed() {
    let (_dir, repo) = setup_repo().await;
    let processor = QueueProcessor::new(
        repo.clone(),
        Arc::new(FakeStore::default()),
        Arc::new(FailingAssembler),
        10,
    );

    let job = make_job();
    repo.create_job(&job).await.unwrap();

    let outcome = processor
        .process(JobSelector::ById(job.id.clone()))
        .await
        .unwrap();
    let ProcessOutcome::Failed { job_id, error } = outcome else {
        panic!("expected Failed, got {outcome:?}");
    };
    assert_eq!(job_id, job.id);
    assert!(error.contains("answer-qid9"), "error names the url: {error}");

    let stored = repo.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.parsed_status(), Some(JobStatus::Failed));
    assert_eq!(stored.error_message.as_deref(), Some(error.as_str()));
    assert!(stored.program_url.is_none());
    assert!(stored.file_count.is_none());
}

#[tokio::test]
async fn upload_failure_marks_the_job_failed() {
    let (_dir, repo) = setup_repo().await;
    let store = Arc::new(FakeStore {
        fail: true,
        ..FakeStore::default()
    });
    let processor = QueueProcessor::new(repo.clone(), store, Arc::new(FakeAssembler::new(1)), 10);

    let job = make_job();
    repo.create_job(&job).await.unwrap();

    let outcome = processor.process(JobSelector::OldestPending).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Failed { .. }));

    let stored = repo.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.parsed_status(), Some(JobStatus::Failed));
    assert!(stored
        .error_message
        .as_deref()
        .unwrap()
        .contains("storage returned 401"));
}

#[tokio::test]
async fn invalid_segments_json_marks_the_job_failed() {
    let (_dir, repo) = setup_repo().await;
    let processor = QueueProcessor::new(
        repo.clone(),
        Arc::new(FakeStore::default()),
        Arc::new(FakeAssembler::new(1)),
        10,
    );

    let job = JobDbModel::new(ProgramType::Kids, "spookyland", "32", "en", "not json");
    repo.create_job(&job).await.unwrap();

    let outcome = processor.process(JobSelector::OldestPending).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Failed { .. }));
    let stored = repo.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.parsed_status(), Some(JobStatus::Failed));
}

#[tokio::test]
async fn empty_queue_reports_nothing_to_do() {
    let (_dir, repo) = setup_repo().await;
    let processor = QueueProcessor::new(
        repo,
        Arc::new(FakeStore::default()),
        Arc::new(FakeAssembler::new(1)),
        10,
    );

    let outcome = processor.process(JobSelector::OldestPending).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::NothingToDo));
}

#[tokio::test]
async fn targeted_unknown_job_reports_not_found() {
    let (_dir, repo) = setup_repo().await;
    let processor = QueueProcessor::new(
        repo,
        Arc::new(FakeStore::default()),
        Arc::new(FakeAssembler::new(1)),
        10,
    );

    let outcome = processor
        .process(JobSelector::ById("no-such-job".into()))
        .await
        .unwrap();
    assert!(matches!(outcome, ProcessOutcome::NotFound { job_id } if job_id == "no-such-job"));
}

#[tokio::test]
async fn concurrent_invocations_on_one_instance_report_busy() {
    let (_dir, repo) = setup_repo().await;

    let hold = Arc::new(Notify::new());
    let assembler = FakeAssembler {
        file_count: 1,
        hold: Some(hold.clone()),
    };
    let processor = Arc::new(QueueProcessor::new(
        repo.clone(),
        Arc::new(FakeStore::default()),
        Arc::new(assembler),
        7,
    ));

    let job = make_job();
    repo.create_job(&job).await.unwrap();

    let first = {
        let processor = processor.clone();
        let id = job.id.clone();
        tokio::spawn(async move { processor.process(JobSelector::ById(id)).await.unwrap() })
    };

    // Wait until the first invocation has claimed the job and is inside the
    // assembler, then hit the same instance again.
    loop {
        let stored = repo.get_job(&job.id).await.unwrap().unwrap();
        if stored.parsed_status() == Some(JobStatus::Processing) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let second = processor.process(JobSelector::OldestPending).await.unwrap();
    assert!(
        matches!(second, ProcessOutcome::Busy { retry_after_secs: 7 }),
        "expected Busy, got {second:?}"
    );

    hold.notify_one();
    let outcome = first.await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Completed { .. }));

    // The busy flag is released once the first run finishes.
    let after = processor.process(JobSelector::OldestPending).await.unwrap();
    assert!(matches!(after, ProcessOutcome::NothingToDo));
}

#[tokio::test]
async fn two_instances_racing_for_one_job_yield_one_completion() {
    let (_dir, repo) = setup_repo().await;

    let make_processor = || {
        Arc::new(QueueProcessor::new(
            repo.clone(),
            Arc::new(FakeStore::default()),
            Arc::new(FakeAssembler::new(1)),
            10,
        ))
    };
    let a = make_processor();
    let b = make_processor();

    let job = make_job();
    repo.create_job(&job).await.unwrap();

    let (ra, rb) = tokio::join!(
        a.process(JobSelector::ById(job.id.clone())),
        b.process(JobSelector::ById(job.id.clone())),
    );
    let outcomes = [ra.unwrap(), rb.unwrap()];

    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, ProcessOutcome::Completed { .. }))
        .count();
    let not_found = outcomes
        .iter()
        .filter(|o| matches!(o, ProcessOutcome::NotFound { .. }))
        .count();
    assert_eq!(completed, 1, "exactly one instance wins the claim");
    assert_eq!(not_found, 1, "the loser sees the job as already taken");

    let stored = repo.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.parsed_status(), Some(JobStatus::Completed));
}

#[tokio::test]
async fn scratch_artifacts_are_gone_after_processing() {
    let (_dir, repo) = setup_repo().await;

    /// Leaks the scratch path so the test can check it after the run.
    struct TrackingAssembler {
        scratch_path: Mutex<Option<PathBuf>>,
    }

    #[async_trait]
    impl Assembler for TrackingAssembler {
        async fn assemble(
            &self,
            _segments: &[SegmentDescriptor],
            output_name: &str,
        ) -> mixdown::Result<AssembledProgram> {
            let scratch = tempfile::tempdir()?;
            let path = scratch.path().join(output_name);
            tokio::fs::write(&path, b"bytes").await?;
            *self.scratch_path.lock().await = Some(scratch.path().to_path_buf());
            Ok(AssembledProgram::new(scratch, path, 1))
        }
    }

    let assembler = Arc::new(TrackingAssembler {
        scratch_path: Mutex::new(None),
    });
    let processor = QueueProcessor::new(
        repo.clone(),
        Arc::new(FakeStore::default()),
        assembler.clone(),
        10,
    );

    let job = make_job();
    repo.create_job(&job).await.unwrap();
    let outcome = processor.process(JobSelector::OldestPending).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Completed { .. }));

    let scratch = assembler.scratch_path.lock().await.clone().unwrap();
    assert!(!scratch.exists(), "scratch directory removed after the run");
}
