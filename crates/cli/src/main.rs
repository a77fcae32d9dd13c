use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread::JoinHandle;

use clap::Parser;
use crossbeam_channel::Receiver;

use facecheck_core::capture::domain::camera::Camera;
use facecheck_core::capture::domain::frame_display::spawn_display;
use facecheck_core::capture::infrastructure::ffmpeg_camera::FfmpegCamera;
use facecheck_core::capture::infrastructure::image_sequence_camera::ImageSequenceCamera;
use facecheck_core::capture::infrastructure::snapshot_display::SnapshotDisplay;
use facecheck_core::detection::domain::face_detector::FaceDetector;
use facecheck_core::detection::infrastructure::model_resolver::{self, ModelSource};
use facecheck_core::detection::infrastructure::onnx_yolo_classifier::OnnxYoloClassifier;
use facecheck_core::imaging::frame_annotator::FrameAnnotator;
use facecheck_core::session::capture_scheduler::CaptureScheduler;
use facecheck_core::session::session_controller::{
    ActionOutcome, ActionResult, SessionController, SessionError,
};
use facecheck_core::session::tick_logger::StatsTickLogger;
use facecheck_core::shared::constants::{PREVIEW_CHANNEL_CAPACITY, YOLO_MODEL_NAME, YOLO_MODEL_URL};
use facecheck_core::shared::settings::Settings;
use facecheck_core::upload::domain::endpoint::{EndpointLabel, UploadEndpoint};
use facecheck_core::upload::infrastructure::http_multipart_uploader::HttpMultipartUploader;

/// Write every Nth preview frame (about twice a second at the default rate).
const PREVIEW_EVERY_NTH: usize = 15;

/// Live face preview with on-demand upload of the detected face.
#[derive(Parser)]
#[command(name = "facecheck")]
struct Cli {
    /// Settings file (defaults to the per-user settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Camera device, video file, stream URL or directory of images.
    #[arg(long)]
    source: Option<String>,

    /// FFmpeg input format for the source, e.g. v4l2, avfoundation, dshow.
    /// Pass an empty string to let FFmpeg detect the format.
    #[arg(long)]
    input_format: Option<String>,

    /// Endpoint receiving saved faces.
    #[arg(long)]
    save_url: Option<String>,

    /// Endpoint checking a face against saved ones.
    #[arg(long)]
    check_url: Option<String>,

    /// Smallest face to detect, in pixels.
    #[arg(long)]
    min_face_size: Option<u32>,

    /// PNG file refreshed with the annotated preview.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Face detection model (.onnx); downloaded when not given.
    #[arg(long)]
    model: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = build_settings(&cli)?;
    validate(&settings)?;

    let detector = build_detector(&settings)?;
    let (preview_tx, preview_rx) = crossbeam_channel::bounded(PREVIEW_CHANNEL_CAPACITY);
    let preview_path = cli
        .preview
        .unwrap_or_else(|| std::env::temp_dir().join("facecheck-preview.png"));
    let display = spawn_display(
        preview_rx,
        Box::new(SnapshotDisplay::new(&preview_path, PREVIEW_EVERY_NTH)),
    );

    let scheduler = CaptureScheduler::new(
        open_camera(&settings),
        detector.clone(),
        FrameAnnotator::default(),
        preview_tx,
        settings.tick_interval(),
        Box::new(StatsTickLogger::default()),
    );
    let uploader = HttpMultipartUploader::new(settings.upload_timeout())?;
    let mut controller = SessionController::new(
        scheduler,
        detector,
        Arc::new(uploader),
        UploadEndpoint::save(&settings.save_url),
        UploadEndpoint::check(&settings.check_url),
        settings.region_dir(),
    );

    eprintln!(
        "Preview: {} (capturing every {} ms)",
        preview_path.display(),
        controller.interval().as_millis()
    );
    eprintln!("Commands: start, stop, toggle, save, check, status, quit");
    run_commands(&mut controller)?;

    controller.stop();
    drop(controller);
    if display.join().is_err() {
        log::warn!("Preview display thread panicked");
    }
    Ok(())
}

fn build_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.settings {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    if let Some(source) = &cli.source {
        settings.camera_source = source.clone();
    }
    if let Some(format) = &cli.input_format {
        settings.camera_input_format = Some(format.clone()).filter(|f| !f.is_empty());
    }
    if let Some(url) = &cli.save_url {
        settings.save_url = url.clone();
    }
    if let Some(url) = &cli.check_url {
        settings.check_url = url.clone();
    }
    if let Some(size) = cli.min_face_size {
        settings.min_face_size = size;
    }
    if let Some(model) = &cli.model {
        settings.model_path = Some(model.clone());
    }
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    if settings.min_face_size == 0 {
        return Err("Minimum face size must be at least 1 pixel".into());
    }
    if !(0.0..=1.0).contains(&settings.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            settings.confidence
        )
        .into());
    }
    for url in [&settings.save_url, &settings.check_url] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!("Upload URL must be http(s), got '{url}'").into());
        }
    }
    Ok(())
}

fn build_detector(settings: &Settings) -> Result<FaceDetector, Box<dyn std::error::Error>> {
    let bundled_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")));
    let source = ModelSource {
        name: YOLO_MODEL_NAME,
        url: YOLO_MODEL_URL,
        explicit: settings.model_path.as_deref(),
        bundled_dir: bundled_dir.as_deref(),
    };
    log::info!("Resolving model: {YOLO_MODEL_NAME}");
    let model_path = model_resolver::resolve(&source, Some(Box::new(download_progress)))?;

    let classifier = OnnxYoloClassifier::new(&model_path, settings.confidence)?;
    Ok(FaceDetector::new(Box::new(classifier), settings.min_face_size))
}

fn open_camera(settings: &Settings) -> Box<dyn Camera> {
    let source = &settings.camera_source;
    if Path::new(source).is_dir() {
        log::info!("Using image sequence from {source}");
        Box::new(ImageSequenceCamera::new(source, true))
    } else {
        Box::new(FfmpegCamera::new(
            source.clone(),
            settings.camera_input_format.clone(),
        ))
    }
}

fn run_commands(controller: &mut SessionController) -> Result<(), Box<dyn std::error::Error>> {
    let mut reporters: Vec<JoinHandle<()>> = Vec::new();
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        match line.trim() {
            "" => {}
            "start" => report_start(controller.start()),
            "stop" => {
                controller.stop();
                println!("Stopped");
            }
            "toggle" => match controller.toggle() {
                Ok(state) => println!("{state:?}"),
                Err(e) => eprintln!("Error: {e}"),
            },
            "save" => reporters.extend(dispatch(EndpointLabel::Save, controller.save())),
            "check" => reporters.extend(dispatch(EndpointLabel::Check, controller.check())),
            "status" => println!(
                "{:?} (save/check {})",
                controller.state(),
                if controller.actions_enabled() {
                    "enabled"
                } else {
                    "disabled"
                }
            ),
            "quit" | "exit" => break,
            other => eprintln!("Unknown command '{other}'"),
        }
        reporters.retain(|h| !h.is_finished());
    }

    controller.wait_for_actions();
    for reporter in reporters {
        if reporter.join().is_err() {
            log::warn!("Result reporter panicked");
        }
    }
    Ok(())
}

fn report_start(result: Result<(), SessionError>) {
    match result {
        Ok(()) => println!("Running"),
        Err(e) => eprintln!("Error: {e}"),
    }
}

/// Prints the action's result from its own thread once the upload finishes.
fn dispatch(
    label: EndpointLabel,
    pending: Result<Receiver<ActionResult>, SessionError>,
) -> Option<JoinHandle<()>> {
    let rx = match pending {
        Ok(rx) => rx,
        Err(e) => {
            eprintln!("Error: {e}");
            return None;
        }
    };
    Some(std::thread::spawn(move || match rx.recv() {
        Ok(result) => print_result(label, result),
        Err(_) => log::warn!("{label} worker exited without a result"),
    }))
}

fn print_result(label: EndpointLabel, result: ActionResult) {
    match result {
        Ok(ActionOutcome::Uploaded(lines)) => {
            println!("{label} image response:");
            for line in lines {
                println!("{line}");
            }
        }
        Ok(ActionOutcome::NoFaceDetected) => println!("No face detected"),
        Err(SessionError::Upload(e)) => {
            log::warn!("{label} upload failed: {e}");
            println!("Internal server error or can not connect to server");
        }
        Err(e) => eprintln!("Error: {e}"),
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
