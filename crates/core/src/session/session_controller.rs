use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use thiserror::Error;

use crate::detection::domain::face_detector::FaceDetector;
use crate::imaging::region_extractor::{RegionError, RegionExtractor};
use crate::shared::frame::Frame;
use crate::upload::domain::endpoint::{EndpointLabel, UploadEndpoint};
use crate::upload::domain::uploader::{UploadError, Uploader};
use crate::upload::infrastructure::region_file::RegionFile;

use super::capture_scheduler::{CaptureError, CaptureScheduler, SchedulerState};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("start the camera before saving or checking")]
    NotRunning,
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error(transparent)]
    Upload(#[from] UploadError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Server reply, one entry per line.
    Uploaded(Vec<String>),
    NoFaceDetected,
}

pub type ActionResult = Result<ActionOutcome, SessionError>;

/// Drives the capture session and the save/check actions.
///
/// Dropping the controller waits for actions still in flight.
pub struct SessionController {
    scheduler: CaptureScheduler,
    uploads: UploadPath,
    save_endpoint: UploadEndpoint,
    check_endpoint: UploadEndpoint,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionController {
    pub fn new(
        scheduler: CaptureScheduler,
        detector: FaceDetector,
        uploader: Arc<dyn Uploader>,
        save_endpoint: UploadEndpoint,
        check_endpoint: UploadEndpoint,
        region_dir: PathBuf,
    ) -> Self {
        Self {
            scheduler,
            uploads: UploadPath {
                detector,
                extractor: RegionExtractor::new(),
                uploader,
                region_dir,
            },
            save_endpoint,
            check_endpoint,
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn interval(&self) -> std::time::Duration {
        self.scheduler.interval()
    }

    /// Save and check are only meaningful while frames are flowing.
    pub fn actions_enabled(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        Ok(self.scheduler.start()?)
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    /// Starts when idle, stops when running. Returns the new state.
    pub fn toggle(&mut self) -> Result<SchedulerState, SessionError> {
        match self.state() {
            SchedulerState::Idle => self.start()?,
            SchedulerState::Running => self.stop(),
        }
        Ok(self.state())
    }

    pub fn save(&self) -> Result<Receiver<ActionResult>, SessionError> {
        self.trigger(EndpointLabel::Save)
    }

    pub fn check(&self) -> Result<Receiver<ActionResult>, SessionError> {
        self.trigger(EndpointLabel::Check)
    }

    /// Blocks until every dispatched save/check has delivered its result.
    pub fn wait_for_actions(&self) {
        let pending = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if !pending.is_empty() {
            log::info!("Waiting for {} pending action(s)", pending.len());
        }
        for handle in pending {
            if handle.join().is_err() {
                log::warn!("Action worker panicked");
            }
        }
    }

    /// Runs detection, extraction and upload on `frame` on the calling thread.
    pub fn process_frame(&self, frame: &Frame, label: EndpointLabel) -> ActionResult {
        self.uploads.run(frame, self.endpoint(label))
    }

    fn endpoint(&self, label: EndpointLabel) -> &UploadEndpoint {
        match label {
            EndpointLabel::Save => &self.save_endpoint,
            EndpointLabel::Check => &self.check_endpoint,
        }
    }

    /// Grabs a frame now and finishes the action on a worker thread.
    fn trigger(&self, label: EndpointLabel) -> Result<Receiver<ActionResult>, SessionError> {
        if !self.actions_enabled() {
            return Err(SessionError::NotRunning);
        }
        let frame = self.scheduler.grab_frame()?;
        log::debug!("{label} action dispatched for frame {}", frame.index());

        let uploads = self.uploads.clone();
        let endpoint = self.endpoint(label).clone();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let handle = std::thread::spawn(move || {
            let _ = tx.send(uploads.run(&frame, &endpoint));
        });

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        workers.retain(|h| !h.is_finished());
        workers.push(handle);
        Ok(rx)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.wait_for_actions();
    }
}

/// The detect → extract → write → upload path, shareable with workers.
#[derive(Clone)]
struct UploadPath {
    detector: FaceDetector,
    extractor: RegionExtractor,
    uploader: Arc<dyn Uploader>,
    region_dir: PathBuf,
}

impl UploadPath {
    fn run(&self, frame: &Frame, endpoint: &UploadEndpoint) -> ActionResult {
        let faces = self.detector.detect_for_upload(frame);
        let Some(face) = faces.first() else {
            log::info!("{}: no face detected in frame {}", endpoint.label(), frame.index());
            return Ok(ActionOutcome::NoFaceDetected);
        };
        if faces.len() > 1 {
            log::debug!("{} faces detected; uploading the first", faces.len());
        }

        let region = self.extractor.extract(frame, face)?;
        let file = RegionFile::write(&self.region_dir, &region)?;
        let result = file
            .read_bytes()
            .and_then(|bytes| self.uploader.upload(endpoint, &bytes, &file.file_name()));
        file.delete();

        let lines = result?;
        log::info!("{endpoint} replied with {} line(s)", lines.len());
        Ok(ActionOutcome::Uploaded(lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::frame_annotator::FrameAnnotator;
    use crate::session::capture_scheduler::tests::{detector_with, StubCamera};
    use crate::session::tick_logger::NullTickLogger;
    use crate::shared::rectangle::Rectangle;
    use crate::upload::infrastructure::http_multipart_uploader::HttpMultipartUploader;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    type Reply = fn() -> Result<Vec<String>, UploadError>;

    /// Records each upload and answers with a canned reply.
    struct RecordingUploader {
        calls: Mutex<Vec<(EndpointLabel, String, Vec<u8>)>>,
        reply: Reply,
    }

    impl RecordingUploader {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply,
            })
        }

        fn calls(&self) -> Vec<(EndpointLabel, String, Vec<u8>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Uploader for RecordingUploader {
        fn upload(
            &self,
            endpoint: &UploadEndpoint,
            file_bytes: &[u8],
            file_name: &str,
        ) -> Result<Vec<String>, UploadError> {
            self.calls.lock().unwrap().push((
                endpoint.label(),
                file_name.to_string(),
                file_bytes.to_vec(),
            ));
            (self.reply)()
        }
    }

    fn match_reply() -> Result<Vec<String>, UploadError> {
        Ok(vec!["OK".to_string(), "MATCH=true".to_string()])
    }

    fn slow_match_reply() -> Result<Vec<String>, UploadError> {
        std::thread::sleep(Duration::from_millis(200));
        match_reply()
    }

    fn face() -> Rectangle {
        Rectangle::new(50, 50, 100, 100)
    }

    fn frame() -> Frame {
        Frame::new(vec![90u8; 200 * 200 * 3], 200, 200, 3, 7)
    }

    fn controller(
        faces: Vec<Rectangle>,
        uploader: Arc<dyn Uploader>,
        region_dir: &Path,
    ) -> SessionController {
        let (camera, _counters) = StubCamera::new();
        let (tx, _rx) = crossbeam_channel::bounded(2);
        let detector = detector_with(faces);
        let scheduler = CaptureScheduler::new(
            Box::new(camera),
            detector.clone(),
            FrameAnnotator::default(),
            tx,
            Duration::from_millis(33),
            Box::new(NullTickLogger),
        );
        SessionController::new(
            scheduler,
            detector,
            uploader,
            UploadEndpoint::save("http://127.0.0.1:1/save"),
            UploadEndpoint::check("http://127.0.0.1:1/check"),
            region_dir.to_path_buf(),
        )
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).map_or(true, |mut d| d.next().is_none())
    }

    #[test]
    fn test_save_without_face_skips_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let uploader = RecordingUploader::new(match_reply);
        let c = controller(vec![], uploader.clone(), tmp.path());

        let outcome = c.process_frame(&frame(), EndpointLabel::Save).unwrap();
        assert_eq!(outcome, ActionOutcome::NoFaceDetected);
        assert!(uploader.calls().is_empty());
        assert!(dir_is_empty(tmp.path()));
    }

    #[test]
    fn test_check_returns_server_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let uploader = RecordingUploader::new(match_reply);
        let c = controller(vec![face()], uploader.clone(), tmp.path());

        let outcome = c.process_frame(&frame(), EndpointLabel::Check).unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::Uploaded(vec!["OK".to_string(), "MATCH=true".to_string()])
        );

        let calls = uploader.calls();
        assert_eq!(calls.len(), 1);
        let (label, name, bytes) = &calls[0];
        assert_eq!(*label, EndpointLabel::Check);
        assert!(name.starts_with("temp_") && name.ends_with(".png"));
        let uploaded = image::load_from_memory(bytes).unwrap();
        assert_eq!((uploaded.width(), uploaded.height()), (100, 100));
        assert!(dir_is_empty(tmp.path()));
    }

    #[test]
    fn test_only_first_face_is_uploaded() {
        let tmp = tempfile::tempdir().unwrap();
        let uploader = RecordingUploader::new(match_reply);
        let faces = vec![Rectangle::new(0, 0, 40, 30), face()];
        let c = controller(faces, uploader.clone(), tmp.path());

        c.process_frame(&frame(), EndpointLabel::Save).unwrap();
        let calls = uploader.calls();
        assert_eq!(calls.len(), 1);
        let uploaded = image::load_from_memory(&calls[0].2).unwrap();
        assert_eq!((uploaded.width(), uploaded.height()), (40, 30));
    }

    #[test]
    fn test_upload_failure_still_deletes_region_file() {
        let tmp = tempfile::tempdir().unwrap();
        let uploader = RecordingUploader::new(|| {
            Err(UploadError::Status {
                url: "http://server/check".to_string(),
                status: 500,
            })
        });
        let c = controller(vec![face()], uploader, tmp.path());

        let err = c.process_frame(&frame(), EndpointLabel::Check).unwrap_err();
        assert!(matches!(err, SessionError::Upload(UploadError::Status { .. })));
        assert!(dir_is_empty(tmp.path()));
    }

    #[test]
    fn test_unreachable_endpoint_fails_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let uploader = Arc::new(HttpMultipartUploader::new(Some(Duration::from_secs(2))).unwrap());
        let c = controller(vec![face()], uploader, tmp.path());

        let err = c.process_frame(&frame(), EndpointLabel::Save).unwrap_err();
        assert!(matches!(err, SessionError::Upload(UploadError::Transport { .. })));
        assert!(dir_is_empty(tmp.path()));
    }

    #[test]
    fn test_actions_rejected_while_idle() {
        let tmp = tempfile::tempdir().unwrap();
        let uploader = RecordingUploader::new(match_reply);
        let c = controller(vec![face()], uploader.clone(), tmp.path());

        assert!(!c.actions_enabled());
        assert!(matches!(c.save(), Err(SessionError::NotRunning)));
        assert!(matches!(c.check(), Err(SessionError::NotRunning)));
        assert!(uploader.calls().is_empty());
    }

    #[test]
    fn test_save_while_running_delivers_result() {
        let tmp = tempfile::tempdir().unwrap();
        let uploader = RecordingUploader::new(match_reply);
        let mut c = controller(vec![face()], uploader.clone(), tmp.path());

        c.start().unwrap();
        assert!(c.actions_enabled());
        let rx = c.save().unwrap();
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert!(matches!(outcome, ActionOutcome::Uploaded(_)));
        assert_eq!(uploader.calls()[0].0, EndpointLabel::Save);
        c.stop();
    }

    #[test]
    fn test_toggle_alternates_state() {
        let tmp = tempfile::tempdir().unwrap();
        let mut c = controller(vec![], RecordingUploader::new(match_reply), tmp.path());

        assert_eq!(c.toggle().unwrap(), SchedulerState::Running);
        assert_eq!(c.toggle().unwrap(), SchedulerState::Idle);
        assert!(!c.actions_enabled());
        assert_eq!(c.interval(), Duration::from_millis(33));
    }

    #[test]
    fn test_start_failure_reports_camera() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut camera, _counters) = StubCamera::new();
        camera.fail_open = true;
        let (tx, _rx) = crossbeam_channel::bounded(2);
        let detector = detector_with(vec![]);
        let scheduler = CaptureScheduler::new(
            Box::new(camera),
            detector.clone(),
            FrameAnnotator::default(),
            tx,
            Duration::from_millis(33),
            Box::new(NullTickLogger),
        );
        let mut c = SessionController::new(
            scheduler,
            detector,
            RecordingUploader::new(match_reply),
            UploadEndpoint::save("http://127.0.0.1:1/save"),
            UploadEndpoint::check("http://127.0.0.1:1/check"),
            tmp.path().to_path_buf(),
        );

        let err = c.start().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Capture(CaptureError::CameraUnavailable(_))
        ));
        assert_eq!(c.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_wait_for_actions_finishes_pending_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let uploader = RecordingUploader::new(slow_match_reply);
        let mut c = controller(vec![face()], uploader.clone(), tmp.path());

        c.start().unwrap();
        let rx = c.save().unwrap();
        c.stop();
        c.wait_for_actions();

        let outcome = rx.try_recv().unwrap().unwrap();
        assert!(matches!(outcome, ActionOutcome::Uploaded(_)));
        assert_eq!(uploader.calls().len(), 1);
        assert!(dir_is_empty(tmp.path()));
    }

    #[test]
    fn test_drop_waits_for_in_flight_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let uploader = RecordingUploader::new(slow_match_reply);
        let mut c = controller(vec![face()], uploader, tmp.path());

        c.start().unwrap();
        let save = c.save().unwrap();
        let check = c.check().unwrap();
        drop(c);

        assert!(save.try_recv().unwrap().is_ok());
        assert!(check.try_recv().unwrap().is_ok());
        assert!(dir_is_empty(tmp.path()));
    }
}
