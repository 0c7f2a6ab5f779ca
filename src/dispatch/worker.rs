//! Background AI worker
//!
//! Runs vision queries on a dedicated thread with its own tokio runtime so a
//! slow model never stalls the frame loop. Jobs go in over one channel and
//! answers come back over another.
//!
//! Every job is stamped with the generation current when it was sent.
//! [`AiWorker::cancel`] bumps the generation: queued jobs from an older
//! generation are skipped and answers from one are discarded.

use super::{response_text, CanvasDispatcher, VisionClient, VisionRequest};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Queued jobs before `send` reports the worker as busy
const JOB_QUEUE_CAPACITY: usize = 4;

const RESULT_QUEUE_CAPACITY: usize = 16;

struct Job {
    generation: u64,
    request: VisionRequest,
}

struct Answer {
    generation: u64,
    text: String,
}

/// Dispatcher backed by a worker thread
pub struct AiWorker {
    jobs: Option<Sender<Job>>,
    answers: Receiver<Answer>,
    generation: Arc<AtomicU64>,
    pending: bool,
    /// Answer produced locally when the queue rejects a job
    local: Option<String>,
    worker_thread: Option<JoinHandle<()>>,
}

impl AiWorker {
    /// Spawn the worker thread
    pub fn spawn<C: VisionClient + 'static>(client: C) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (job_tx, job_rx) = bounded::<Job>(JOB_QUEUE_CAPACITY);
        let (answer_tx, answer_rx) = bounded::<Answer>(RESULT_QUEUE_CAPACITY);
        let generation = Arc::new(AtomicU64::new(0));

        let worker_generation = generation.clone();
        let worker_thread = std::thread::Builder::new()
            .name("ai-worker".to_string())
            .spawn(move || {
                run_jobs(client, runtime, job_rx, answer_tx, worker_generation);
            })?;

        tracing::info!("AI worker started");

        Ok(Self {
            jobs: Some(job_tx),
            answers: answer_rx,
            generation,
            pending: false,
            local: None,
            worker_thread: Some(worker_thread),
        })
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Take the next answer of the current generation, skipping stale ones
    fn take_current(&mut self, answer: Answer) -> Option<String> {
        if answer.generation == self.generation() {
            self.pending = false;
            Some(answer.text)
        } else {
            tracing::debug!("Discarding stale answer from generation {}", answer.generation);
            None
        }
    }
}

impl CanvasDispatcher for AiWorker {
    fn send(&mut self, request: VisionRequest) {
        let job = Job {
            generation: self.generation(),
            request,
        };

        let Some(jobs) = &self.jobs else {
            self.local = Some(response_text::<&str>(Err("AI worker has stopped")));
            return;
        };

        match jobs.try_send(job) {
            Ok(()) => {
                tracing::info!("Queued vision query (generation {})", self.generation());
                self.pending = true;
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!("AI worker queue full, dropping query");
                self.local = Some(response_text::<&str>(Err("AI worker is busy")));
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::error!("AI worker thread is gone");
                self.local = Some(response_text::<&str>(Err("AI worker has stopped")));
            }
        }
    }

    fn poll(&mut self) -> Option<String> {
        if let Some(text) = self.local.take() {
            return Some(text);
        }

        let mut newest = None;
        while let Ok(answer) = self.answers.try_recv() {
            if let Some(text) = self.take_current(answer) {
                newest = Some(text);
            }
        }
        newest
    }

    fn cancel(&mut self) {
        let previous = self.generation.fetch_add(1, Ordering::SeqCst);
        if self.pending {
            tracing::info!("Cancelled outstanding vision query (generation {})", previous);
        }
        self.pending = false;
        self.local = None;
        while self.answers.try_recv().is_ok() {}
    }

    fn is_pending(&self) -> bool {
        self.pending || self.local.is_some()
    }

    fn wait(&mut self, timeout: Duration) -> Option<String> {
        if let Some(text) = self.poll() {
            return Some(text);
        }

        let deadline = Instant::now() + timeout;
        while self.pending {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.answers.recv_timeout(remaining) {
                Ok(answer) => {
                    if let Some(text) = self.take_current(answer) {
                        return Some(text);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!("Timed out waiting for vision answer");
                    return None;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.pending = false;
                    return None;
                }
            }
        }
        None
    }
}

impl Drop for AiWorker {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        // Closing the job channel ends the worker loop
        self.jobs.take();
        if let Some(handle) = self.worker_thread.take() {
            let _ = handle.join();
        }
        tracing::info!("AI worker stopped");
    }
}

/// Worker loop
fn run_jobs<C: VisionClient>(
    client: C,
    runtime: tokio::runtime::Runtime,
    jobs: Receiver<Job>,
    answers: Sender<Answer>,
    generation: Arc<AtomicU64>,
) {
    for job in jobs.iter() {
        if job.generation != generation.load(Ordering::SeqCst) {
            tracing::debug!("Skipping cancelled job from generation {}", job.generation);
            continue;
        }

        let result = runtime.block_on(client.describe(&job.request.prompt, &job.request.image_png));
        if let Err(e) = &result {
            tracing::error!("Vision query failed: {}", e);
        }

        if job.generation != generation.load(Ordering::SeqCst) {
            tracing::debug!("Dropping answer for cancelled job");
            continue;
        }

        let answer = Answer {
            generation: job.generation,
            text: response_text(result),
        };
        match answers.try_send(answer) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Answer queue full, dropping answer");
            }
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::ScriptedClient;
    use super::*;

    fn request() -> VisionRequest {
        VisionRequest::new("Which side wins?", vec![0; 16])
    }

    #[test]
    fn test_worker_delivers_answer() {
        let client = ScriptedClient::answering("left");
        let mut worker = AiWorker::spawn(client.clone()).unwrap();

        worker.send(request());
        assert!(worker.is_pending());
        assert_eq!(worker.wait(Duration::from_secs(5)).as_deref(), Some("left"));
        assert!(!worker.is_pending());
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn test_worker_failure_becomes_text() {
        let mut worker = AiWorker::spawn(ScriptedClient::failing(503)).unwrap();
        worker.send(request());
        let text = worker.wait(Duration::from_secs(5)).unwrap();
        assert!(text.starts_with("Error: "));
    }

    #[test]
    fn test_cancel_discards_in_flight_answer() {
        let client = ScriptedClient::answering("right").with_delay(Duration::from_millis(200));
        let mut worker = AiWorker::spawn(client).unwrap();

        worker.send(request());
        std::thread::sleep(Duration::from_millis(50));
        worker.cancel();
        assert!(!worker.is_pending());

        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(worker.poll(), None);
    }

    #[test]
    fn test_new_query_after_cancel() {
        let client = ScriptedClient::answering("left").with_delay(Duration::from_millis(50));
        let mut worker = AiWorker::spawn(client).unwrap();

        worker.send(request());
        worker.cancel();
        worker.send(request());
        assert_eq!(worker.wait(Duration::from_secs(5)).as_deref(), Some("left"));
        assert_eq!(worker.generation(), 1);
    }

    #[test]
    fn test_wait_times_out() {
        let client = ScriptedClient::answering("late").with_delay(Duration::from_millis(500));
        let mut worker = AiWorker::spawn(client).unwrap();
        worker.send(request());
        assert_eq!(worker.wait(Duration::from_millis(20)), None);
        assert!(worker.is_pending());
    }

    #[test]
    fn test_wait_without_query() {
        let mut worker = AiWorker::spawn(ScriptedClient::answering("unused")).unwrap();
        assert_eq!(worker.wait(Duration::from_millis(10)), None);
    }
}
