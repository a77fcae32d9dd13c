use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use thiserror::Error;

use crate::capture::domain::camera::Camera;
use crate::detection::domain::face_detector::FaceDetector;
use crate::imaging::frame_annotator::FrameAnnotator;
use crate::shared::frame::Frame;

use super::tick_logger::TickLogger;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("capture is not running")]
    NotRunning,
    #[error("camera returned an empty frame")]
    EmptyFrame,
    #[error("failed to read frame: {0}")]
    Read(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Owns the camera and the periodic capture task.
///
/// While running, a background thread ticks at a fixed rate: read a frame,
/// run preview detection, draw the outlines and hand the frame to the
/// display channel without blocking. The camera is open exactly while the
/// scheduler is `Running`.
pub struct CaptureScheduler {
    camera: Arc<Mutex<Box<dyn Camera>>>,
    detector: FaceDetector,
    annotator: FrameAnnotator,
    preview_tx: Sender<Frame>,
    interval: Duration,
    logger: Arc<Mutex<SessionLog>>,
    task: Option<TickTask>,
}

/// The tick logger plus the session currently allowed to write to it.
///
/// A ticker that outlived its stop keeps a stale session number, so its
/// late ticks and summary never land in the next session's statistics.
struct SessionLog {
    session: u64,
    logger: Box<dyn TickLogger>,
}

impl SessionLog {
    fn begin(&mut self) -> u64 {
        self.session += 1;
        self.logger.reset();
        self.session
    }

    fn current(&mut self, session: u64) -> Option<&mut Box<dyn TickLogger>> {
        if self.session == session {
            Some(&mut self.logger)
        } else {
            None
        }
    }
}

struct TickTask {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

impl CaptureScheduler {
    pub fn new(
        camera: Box<dyn Camera>,
        detector: FaceDetector,
        annotator: FrameAnnotator,
        preview_tx: Sender<Frame>,
        interval: Duration,
        logger: Box<dyn TickLogger>,
    ) -> Self {
        Self {
            camera: Arc::new(Mutex::new(camera)),
            detector,
            annotator,
            preview_tx,
            interval: interval.max(Duration::from_millis(1)),
            logger: Arc::new(Mutex::new(SessionLog { session: 0, logger })),
            task: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.task.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Opens the camera and starts ticking. Does nothing when already running.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.task.is_some() {
            log::debug!("Capture already running");
            return Ok(());
        }

        {
            let mut camera = lock(&self.camera);
            if let Err(e) = camera.open() {
                camera.release();
                return Err(CaptureError::CameraUnavailable(e.to_string()));
            }
            if !camera.is_opened() {
                camera.release();
                return Err(CaptureError::CameraUnavailable(
                    "camera did not report open".to_string(),
                ));
            }
        }
        let session = lock(&self.logger).begin();

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let ticker = Ticker {
            camera: Arc::clone(&self.camera),
            detector: self.detector.clone(),
            annotator: self.annotator.clone(),
            preview_tx: self.preview_tx.clone(),
            logger: Arc::clone(&self.logger),
            session,
        };
        let interval = self.interval;
        let handle = std::thread::spawn(move || {
            ticker.run(interval, &stop_rx);
            let _ = done_tx.send(());
        });

        self.task = Some(TickTask {
            stop_tx,
            done_rx,
            handle,
        });
        log::info!("Capture started ({} ms interval)", interval.as_millis());
        Ok(())
    }

    /// Stops ticking and releases the camera. Does nothing when idle.
    ///
    /// Waits at most one tick interval for the task to finish; the camera
    /// is released either way.
    pub fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        let _ = task.stop_tx.try_send(());
        match task.done_rx.recv_timeout(self.interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if task.handle.join().is_err() {
                    log::warn!("Capture task panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Capture task did not stop within {} ms; releasing camera anyway",
                    self.interval.as_millis()
                );
            }
        }

        lock(&self.camera).release();
        log::info!("Capture stopped");
    }

    /// Reads one fresh frame outside the tick loop.
    pub fn grab_frame(&self) -> Result<Frame, CaptureError> {
        if self.task.is_none() {
            return Err(CaptureError::NotRunning);
        }
        read_frame(&self.camera)
    }
}

impl Drop for CaptureScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything one tick touches, moved onto the capture thread.
struct Ticker {
    camera: Arc<Mutex<Box<dyn Camera>>>,
    detector: FaceDetector,
    annotator: FrameAnnotator,
    preview_tx: Sender<Frame>,
    logger: Arc<Mutex<SessionLog>>,
    session: u64,
}

impl Ticker {
    fn run(&self, interval: Duration, stop_rx: &Receiver<()>) {
        let clock = crossbeam_channel::tick(interval);
        let mut index: u64 = 0;
        self.tick(index);

        loop {
            let stopping = select! {
                recv(stop_rx) -> _ => true,
                // Both may be ready at once; a pending stop wins.
                recv(clock) -> _ => !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)),
            };
            if stopping {
                break;
            }
            index += 1;
            self.tick(index);
        }

        match lock(&self.logger).current(self.session) {
            Some(logger) => logger.summary(),
            None => log::debug!(
                "Session {} ended after a restart; summary skipped",
                self.session
            ),
        }
    }

    fn tick(&self, index: u64) {
        let started = Instant::now();
        let frame = match read_frame(&self.camera) {
            Ok(frame) => frame,
            Err(CaptureError::EmptyFrame) => {
                log::debug!("Tick {index}: empty frame skipped");
                return;
            }
            Err(e) => {
                log::warn!("Tick {index}: {e}");
                return;
            }
        };
        let read_ms = elapsed_ms(started);

        let detect_start = Instant::now();
        let faces = self.detector.detect_for_preview(&frame);
        let detect_ms = elapsed_ms(detect_start);

        let annotate_start = Instant::now();
        let annotated = self.annotator.annotate(frame, &faces);
        let annotate_ms = elapsed_ms(annotate_start);

        match self.preview_tx.try_send(annotated) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::debug!("Tick {index}: display lagging, preview frame dropped")
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("Tick {index}: display closed, preview frame dropped")
            }
        }

        let mut slot = lock(&self.logger);
        let Some(logger) = slot.current(self.session) else {
            return;
        };
        logger.timing("read", read_ms);
        logger.timing("detect", detect_ms);
        logger.timing("annotate", annotate_ms);
        logger.metric("faces", faces.len() as f64);
        logger.tick(index);
    }
}

fn read_frame(camera: &Mutex<Box<dyn Camera>>) -> Result<Frame, CaptureError> {
    match lock(camera).read() {
        Ok(Some(frame)) if !frame.is_empty() => Ok(frame),
        Ok(_) => Err(CaptureError::EmptyFrame),
        Err(e) => Err(CaptureError::Read(e.to_string())),
    }
}

/// A panic on another thread must not stop the camera from being released.
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
