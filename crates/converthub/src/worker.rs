//! Detached worker that drains a queue of submitted jobs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::pipeline::FileConversionPipeline;

struct Shared {
    queue: Mutex<VecDeque<u64>>,
    available: Condvar,
    shutdown: AtomicBool,
}

/// Background thread that processes enqueued job ids in order.
///
/// Submission stays non-blocking: `enqueue` pushes and returns. A job
/// that loses its claim (already processed elsewhere) is logged and
/// skipped, never retried. On shutdown the in-flight job finishes;
/// anything still queued stays `pending`.
pub struct PipelineWorker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl PipelineWorker {
    /// Spawn the worker thread.
    pub fn spawn(pipeline: FileConversionPipeline) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let worker_shared = Arc::clone(&shared);
        let handle = thread::spawn(move || worker_loop(pipeline, worker_shared));
        debug!("pipeline worker started");
        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// Queue a job for processing and return immediately.
    pub fn enqueue(&self, id: u64) {
        let mut queue = self.shared.queue.lock().unwrap();
        queue.push_back(id);
        drop(queue);
        self.shared.available.notify_one();
    }

    /// Jobs waiting in the queue, not counting one in flight.
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }

    /// Stop after the in-flight job and join the worker thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.available.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("pipeline worker stopped");
        }
    }
}

impl Drop for PipelineWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(pipeline: FileConversionPipeline, shared: Arc<Shared>) {
    loop {
        let id = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                if let Some(id) = queue.pop_front() {
                    break id;
                }
                queue = shared.available.wait(queue).unwrap();
            }
        };
        match pipeline.process(id) {
            Ok(job) => info!(job = id, status = %job.status, "worker finished job"),
            // Lost claims and unknown ids are not the worker's to fix.
            Err(err) => warn!(job = id, error = %err, "worker skipped job"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{ConvertError, Converter, ConverterDecl};
    use crate::job::{JobStatus, JobStore, MemoryJobStore, NewFileJob};
    use crate::properties::Properties;
    use crate::registry::ConverterRegistry;
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, Instant};

    struct UpperCase {
        decl: ConverterDecl,
        delay: Duration,
    }

    impl UpperCase {
        fn new(delay: Duration) -> Self {
            Self {
                decl: ConverterDecl::new("test.txt-to-up", "txt", "up"),
                delay,
            }
        }
    }

    impl Converter for UpperCase {
        fn decl(&self) -> &ConverterDecl {
            &self.decl
        }

        fn convert(&self, input: &[u8], _options: &Properties) -> Result<Vec<u8>, ConvertError> {
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            Ok(input.to_ascii_uppercase())
        }
    }

    fn make_worker(delay: Duration) -> (Arc<MemoryJobStore>, FileConversionPipeline) {
        let mut registry = ConverterRegistry::new();
        registry.register(UpperCase::new(delay));
        let store = Arc::new(MemoryJobStore::new());
        let pipeline = FileConversionPipeline::new(store.clone(), Arc::new(registry));
        (store, pipeline)
    }

    fn submit(store: &MemoryJobStore, input: &Path) -> u64 {
        store
            .create(NewFileJob {
                user: None,
                input_file: input.to_path_buf(),
                input_format: "txt".into(),
                output_format: "up".into(),
                size_input: 0,
            })
            .id
    }

    fn wait_terminal(store: &MemoryJobStore, ids: &[u64]) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let done = ids.iter().all(|id| {
                store
                    .load(*id)
                    .map(|j| j.status.is_terminal())
                    .unwrap_or(false)
            });
            if done {
                return;
            }
            assert!(Instant::now() < deadline, "jobs did not reach a terminal state");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_worker_drains_queue_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (store, pipeline) = make_worker(Duration::ZERO);
        let worker = PipelineWorker::spawn(pipeline);

        let mut ids = Vec::new();
        for name in ["a.txt", "b.txt", "c.txt"] {
            let path = dir.path().join(name);
            fs::write(&path, name).unwrap();
            ids.push(submit(&store, &path));
        }
        for id in &ids {
            worker.enqueue(*id);
        }

        wait_terminal(&store, &ids);
        for id in ids {
            let job = store.load(id).unwrap();
            assert_eq!(job.status, JobStatus::Completed);
            assert!(job.output_file.unwrap().exists());
        }
        worker.shutdown();
    }

    #[test]
    fn test_worker_survives_unknown_and_claimed_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let (store, pipeline) = make_worker(Duration::ZERO);

        // Process one job up front so its enqueue below loses the claim.
        let claimed = dir.path().join("claimed.txt");
        fs::write(&claimed, b"done already").unwrap();
        let claimed_id = submit(&store, &claimed);
        pipeline.process(claimed_id).unwrap();

        let worker = PipelineWorker::spawn(pipeline);
        worker.enqueue(9999);
        worker.enqueue(claimed_id);

        let fresh = dir.path().join("fresh.txt");
        fs::write(&fresh, b"still works").unwrap();
        let fresh_id = submit(&store, &fresh);
        worker.enqueue(fresh_id);

        wait_terminal(&store, &[fresh_id]);
        assert_eq!(store.load(fresh_id).unwrap().status, JobStatus::Completed);
        worker.shutdown();
    }

    #[test]
    fn test_shutdown_leaves_queued_jobs_pending() {
        let dir = tempfile::tempdir().unwrap();
        let (store, pipeline) = make_worker(Duration::from_millis(150));
        let worker = PipelineWorker::spawn(pipeline);

        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");
        fs::write(&first, b"one").unwrap();
        fs::write(&second, b"two").unwrap();
        let first_id = submit(&store, &first);
        let second_id = submit(&store, &second);

        worker.enqueue(first_id);
        // Give the worker time to take the first job off the queue.
        thread::sleep(Duration::from_millis(30));
        worker.enqueue(second_id);
        worker.shutdown();

        assert_eq!(store.load(first_id).unwrap().status, JobStatus::Completed);
        assert_eq!(store.load(second_id).unwrap().status, JobStatus::Pending);
    }
}
