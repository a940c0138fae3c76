use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use email_extractor_lib::{
    export, input_loader, AppConfig, BatchDriver, EmailStore, KeywordSearch, ProgressSink,
    Scraper, SearchEngine,
};
use log::{debug, error, info};

const MAX_LOG_LINES: usize = 50;

/// Finished jobs stay queryable this long before they are evicted.
const FINISHED_JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Debug, serde::Serialize)]
pub struct JobStatus {
    pub id: String,
    pub status: String, // "queued", "processing", "completed", "failed"
    pub total_keywords: usize,
    pub processed_count: usize,
    pub progress: f64,
    pub current_keyword: String,
    pub new_records: usize,
    pub storage_limit_reached: bool,
    pub logs: Vec<String>,
    #[serde(skip)]
    finished_at: Option<Instant>,
}

impl JobStatus {
    fn queued(id: &str) -> Self {
        JobStatus {
            id: id.to_string(),
            status: "queued".to_string(),
            total_keywords: 0,
            processed_count: 0,
            progress: 0.0,
            current_keyword: "Initializing...".to_string(),
            new_records: 0,
            storage_limit_reached: false,
            logs: vec!["Job started.".to_string()],
            finished_at: None,
        }
    }

    fn finish(&mut self, status: &str) {
        self.status = status.to_string();
        self.finished_at = Some(Instant::now());
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.finished_at
            .is_some_and(|at| now.duration_since(at) >= FINISHED_JOB_RETENTION)
    }

    fn log(&mut self, msg: impl Into<String>) {
        self.logs.push(msg.into());
        if self.logs.len() > MAX_LOG_LINES {
            self.logs.remove(0);
        }
    }
}

type JobMap = Arc<Mutex<HashMap<String, JobStatus>>>;

pub struct JobManager {
    jobs: JobMap,
}

impl JobManager {
    pub fn new() -> Self {
        JobManager {
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.lock().ok()?.get(job_id).cloned()
    }

    fn prune(&self, now: Instant) {
        if let Ok(mut guard) = self.jobs.lock() {
            guard.retain(|_, job| !job.is_expired(now));
        }
    }

    /// Queues the job and runs it on its own thread.
    pub fn start_job(
        &self,
        job_id: String,
        input_path: PathBuf,
        output_path: PathBuf,
        config: Arc<AppConfig>,
    ) -> String {
        self.prune(Instant::now());
        if let Ok(mut guard) = self.jobs.lock() {
            guard.insert(job_id.clone(), JobStatus::queued(&job_id));
        }

        let progress = JobProgress {
            job_id: job_id.clone(),
            jobs: self.jobs.clone(),
        };

        thread::spawn(move || {
            run_extraction(progress, &input_path, output_path, &config);
            if let Err(e) = std::fs::remove_file(&input_path) {
                debug!("Could not remove upload {}: {}", input_path.display(), e);
            }
        });

        job_id
    }
}

/// Publishes batch progress into the shared job map.
struct JobProgress {
    job_id: String,
    jobs: JobMap,
}

impl JobProgress {
    fn update(&self, f: impl FnOnce(&mut JobStatus)) {
        if let Ok(mut guard) = self.jobs.lock() {
            if let Some(job) = guard.get_mut(&self.job_id) {
                f(job);
            }
        }
    }

    fn fail(&self, msg: String) {
        error!("Job {} failed: {}", self.job_id, msg);
        self.update(|job| {
            job.finish("failed");
            job.log(msg);
        });
    }
}

impl ProgressSink for JobProgress {
    fn on_keyword_start(&mut self, keyword: &str, _index: usize, _total: usize) {
        self.update(|job| {
            job.current_keyword = keyword.to_string();
            job.log(format!("Searching: {}", keyword));
        });
    }

    fn on_progress(&mut self, fraction: f64) {
        self.update(|job| {
            job.progress = fraction;
            job.processed_count += 1;
        });
    }

    fn on_keyword_done(&mut self, keyword: &str, new_records: usize) {
        self.update(|job| {
            job.new_records += new_records;
            if new_records == 0 {
                job.log(format!("No new emails for {}", keyword));
            } else {
                job.log(format!("Stored {} new email(s) for {}", new_records, keyword));
            }
        });
    }

    fn on_storage_limit(&mut self) {
        self.update(|job| {
            if !job.storage_limit_reached {
                job.log("DB limit reached, old data auto-cleared");
            }
            job.storage_limit_reached = true;
        });
    }
}

fn run_extraction(
    mut progress: JobProgress,
    input_path: &Path,
    output_path: PathBuf,
    config: &AppConfig,
) {
    let keywords = match input_loader::load_keywords(input_path) {
        Ok(k) => k,
        Err(e) => return progress.fail(e.to_string()),
    };

    progress.update(|job| {
        job.total_keywords = keywords.len();
        job.status = "processing".to_string();
    });

    let store = match EmailStore::open(&config.store) {
        Ok(s) => s,
        Err(e) => return progress.fail(format!("Failed to open database: {}", e)),
    };
    let scraper = match Scraper::new(&config.http) {
        Ok(s) => s,
        Err(e) => return progress.fail(format!("Failed to build HTTP client: {}", e)),
    };
    let engine = match SearchEngine::new(&config.http, &config.search) {
        Ok(s) => s,
        Err(e) => return progress.fail(format!("Failed to build search client: {}", e)),
    };
    let search = KeywordSearch::new(engine, scraper, config);

    let report = BatchDriver::new(&search, &store).run(&keywords, &mut progress);

    if let Err(e) = export::save_run_csv(&output_path, &report.inserted) {
        return progress.fail(format!("Failed to write results: {}", e));
    }

    info!(
        "Job {} finished with {} new email(s)",
        progress.job_id,
        report.inserted.len()
    );
    progress.update(|job| {
        job.finish("completed");
        job.current_keyword = "Done".to_string();
        job.log("All keywords processed.");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn wait_for(manager: &JobManager, id: &str, status: &str) -> JobStatus {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let job = manager.status(id).expect("job registered");
            if job.status == status || Instant::now() > deadline {
                return job;
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn test_progress_sink_updates_status() {
        let manager = JobManager::new();
        manager
            .jobs
            .lock()
            .unwrap()
            .insert("j1".into(), JobStatus::queued("j1"));
        let mut progress = JobProgress {
            job_id: "j1".into(),
            jobs: manager.jobs.clone(),
        };

        progress.on_keyword_start("acme", 0, 2);
        progress.on_keyword_done("acme", 3);
        progress.on_progress(0.5);
        progress.on_storage_limit();
        progress.on_storage_limit();

        let job = manager.status("j1").unwrap();
        assert_eq!(job.current_keyword, "acme");
        assert_eq!(job.new_records, 3);
        assert_eq!(job.processed_count, 1);
        assert_eq!(job.progress, 0.5);
        assert!(job.storage_limit_reached);
        let limit_lines = job.logs.iter().filter(|l| l.contains("DB limit")).count();
        assert_eq!(limit_lines, 1);
    }

    #[test]
    fn test_malformed_input_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.csv");
        std::fs::File::create(&input)
            .unwrap()
            .write_all(b"company\nAcme\n")
            .unwrap();

        let mut config = AppConfig::default();
        config.store.database_path = dir.path().join("emails.db");

        let manager = JobManager::new();
        let id = manager.start_job(
            "job-x".into(),
            input,
            dir.path().join("out.csv"),
            Arc::new(config),
        );

        let job = wait_for(&manager, &id, "failed");
        assert_eq!(job.status, "failed");
        assert!(job.logs.last().unwrap().contains("keyword"));
        assert!(!dir.path().join("out.csv").exists());
    }

    #[test]
    fn test_upload_removed_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("upload.csv");
        std::fs::write(&input, "company\nAcme\n").unwrap();

        let manager = JobManager::new();
        let id = manager.start_job(
            "job-y".into(),
            input.clone(),
            dir.path().join("out.csv"),
            Arc::new(AppConfig::default()),
        );

        wait_for(&manager, &id, "failed");
        let deadline = Instant::now() + Duration::from_secs(10);
        while input.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!input.exists());
    }

    #[test]
    fn test_finished_jobs_are_evicted() {
        let manager = JobManager::new();
        {
            let mut jobs = manager.jobs.lock().unwrap();
            let mut old = JobStatus::queued("old");
            old.finish("completed");
            jobs.insert("old".into(), old);

            let mut recent = JobStatus::queued("recent");
            recent.finish("failed");
            recent.finished_at = Some(Instant::now() + FINISHED_JOB_RETENTION);
            jobs.insert("recent".into(), recent);

            jobs.insert("running".into(), JobStatus::queued("running"));
        }

        manager.prune(Instant::now() + FINISHED_JOB_RETENTION);

        assert!(manager.status("old").is_none());
        assert!(manager.status("recent").is_some());
        assert!(manager.status("running").is_some());
    }

    #[test]
    fn test_unknown_job() {
        assert!(JobManager::new().status("missing").is_none());
    }
}
