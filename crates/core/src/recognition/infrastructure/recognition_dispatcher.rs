use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::engine::domain::face_engine::{EngineError, FaceEngine};
use crate::pipeline::pipeline_listener::{PipelineError, PipelineListener};
use crate::recognition::domain::recognition_job::{AdmissionPolicy, Rejection, RecognitionJob};
use crate::shared::constants::RECOGNITION_THREAD_NAME;

/// Runs feature extraction on a single background thread.
///
/// Layout: `submit → bounded queue (worker_slots) → worker → listener`
///
/// `submit` never blocks: when the queue is full, an earlier job is still
/// queued or running (under [`AdmissionPolicy::RejectWhileBusy`]), or the
/// dispatcher was released, the request is dropped and the listener
/// immediately receives `None`.
/// Accepted jobs complete in submission order, one at a time.
pub struct RecognitionDispatcher {
    worker: Option<Worker>,
    listener: Arc<dyn PipelineListener>,
    admission: AdmissionPolicy,
    busy: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
}

struct Worker {
    sender: Mutex<Option<Sender<RecognitionJob>>>,
    pending: Receiver<RecognitionJob>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RecognitionDispatcher {
    pub fn new(
        engine: Arc<dyn FaceEngine>,
        listener: Arc<dyn PipelineListener>,
        worker_slots: usize,
        admission: AdmissionPolicy,
    ) -> std::io::Result<Self> {
        if worker_slots == 0 {
            log::warn!("Recognition disabled: worker slot count must be > 0");
            return Ok(Self::disabled(listener));
        }

        let (sender, pending) = crossbeam_channel::bounded::<RecognitionJob>(worker_slots);
        let busy = Arc::new(AtomicBool::new(false));
        let released = Arc::new(AtomicBool::new(false));

        let handle = spawn_worker(
            engine,
            Arc::clone(&listener),
            pending.clone(),
            Arc::clone(&busy),
            Arc::clone(&released),
        )?;

        Ok(Self {
            worker: Some(Worker {
                sender: Mutex::new(Some(sender)),
                pending,
                handle: Mutex::new(Some(handle)),
            }),
            listener,
            admission,
            busy,
            released,
        })
    }

    /// A dispatcher with no worker; every request is rejected.
    pub fn disabled(listener: Arc<dyn PipelineListener>) -> Self {
        Self {
            worker: None,
            listener,
            admission: AdmissionPolicy::default(),
            busy: Arc::new(AtomicBool::new(false)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Queues `job`, returning whether it was accepted.
    ///
    /// A rejected job's listener callback fires before this returns.
    pub fn submit(&self, job: RecognitionJob) -> bool {
        let track_id = job.track_id;
        match self.try_enqueue(job) {
            Ok(()) => true,
            Err(reason) => {
                log::debug!("Recognition request for track {track_id} dropped: {reason:?}");
                self.listener.on_feature(track_id, None);
                false
            }
        }
    }

    fn try_enqueue(&self, job: RecognitionJob) -> Result<(), Rejection> {
        let Some(worker) = &self.worker else {
            return Err(Rejection::NoWorker);
        };
        if self.released.load(Ordering::SeqCst) {
            return Err(Rejection::Released);
        }
        // Claimed at admission so back-to-back submits cannot both slip in
        // before the worker picks the first one up.
        let claimed = self.admission == AdmissionPolicy::RejectWhileBusy;
        if claimed
            && self
                .busy
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            return Err(Rejection::Busy);
        }

        let result = {
            let sender = worker.sender.lock();
            match sender.as_ref().map(|sender| sender.try_send(job)) {
                None => Err(Rejection::Released),
                Some(Ok(())) => Ok(()),
                Some(Err(TrySendError::Full(_))) => Err(Rejection::QueueFull),
                Some(Err(TrySendError::Disconnected(_))) => Err(Rejection::Released),
            }
        };
        if claimed && result.is_err() {
            self.busy.store(false, Ordering::SeqCst);
        }
        result
    }

    /// Jobs waiting behind the one currently executing.
    pub fn pending(&self) -> usize {
        self.worker.as_ref().map_or(0, |w| w.pending.len())
    }

    /// Under `RejectWhileBusy` this covers an accepted job from admission
    /// until its callback returns; otherwise only while a job executes.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Stops accepting jobs, cancels the backlog and joins the worker.
    ///
    /// Queued jobs are not executed; each receives a `None` callback. An
    /// extraction already running is allowed to finish. Safe to call more
    /// than once and from a listener callback.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(worker) = &self.worker else {
            return;
        };

        worker.sender.lock().take();
        let mut cancelled = 0usize;
        for job in worker.pending.try_iter() {
            self.listener.on_feature(job.track_id, None);
            cancelled += 1;
        }

        if let Some(handle) = worker.handle.lock().take() {
            if handle.thread().id() == thread::current().id() {
                // Released from inside a callback; the loop exits on its own.
                return;
            }
            if handle.join().is_err() {
                log::warn!("Recognition worker thread panicked");
            }
        }
        log::info!("Recognition dispatcher released ({cancelled} queued jobs cancelled)");
    }
}

impl Drop for RecognitionDispatcher {
    fn drop(&mut self) {
        self.release();
    }
}

fn spawn_worker(
    engine: Arc<dyn FaceEngine>,
    listener: Arc<dyn PipelineListener>,
    jobs: Receiver<RecognitionJob>,
    busy: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(RECOGNITION_THREAD_NAME.to_string())
        .spawn(move || {
            // Ends once release() drops the sender and the queue is empty.
            for job in jobs.iter() {
                if released.load(Ordering::SeqCst) {
                    listener.on_feature(job.track_id, None);
                } else {
                    busy.store(true, Ordering::SeqCst);
                    execute(&*engine, &*listener, job);
                }
                busy.store(false, Ordering::SeqCst);
            }
        })
}

fn execute(engine: &dyn FaceEngine, listener: &dyn PipelineListener, job: RecognitionJob) {
    let start = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        engine.extract_feature(&job.frame, &job.face)
    }))
    .unwrap_or_else(|_| Err(EngineError::Other("engine panicked".into())));

    match result {
        Ok(feature) => {
            log::debug!(
                "Extracted feature for track {} in {:.1}ms",
                job.track_id,
                start.elapsed().as_secs_f64() * 1000.0
            );
            listener.on_feature(job.track_id, Some(feature));
        }
        Err(source) => {
            log::warn!("Feature extraction failed for track {}: {source}", job.track_id);
            listener.on_feature(job.track_id, None);
            listener.on_fail(&PipelineError::Extraction {
                track_id: job.track_id,
                source,
            });
        }
    }
}
