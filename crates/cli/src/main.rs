use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{Receiver, Sender};

use facesense_core::classification::domain::classifier::{Classifier, ClassifierModel};
use facesense_core::classification::infrastructure::assets;
use facesense_core::classification::infrastructure::ort_classifier::OrtClassifierBackend;
use facesense_core::conversion::sensor_frame::SensorFrame;
use facesense_core::detection::domain::face_detector::{DetectorOptions, PerformanceMode};
use facesense_core::detection::infrastructure::onnx_face_detector::{
    OnnxFaceDetector, DEFAULT_CONFIDENCE,
};
use facesense_core::pipeline::camera_source::{BindingError, CameraSource};
use facesense_core::pipeline::controller::DetectionController;
use facesense_core::pipeline::event_sink::EventSink;
use facesense_core::pipeline::frame_analyzer::{DetectionOptions, FrameAnalyzer};
use facesense_core::pipeline::infrastructure::frame_feed::FrameFeed;
use facesense_core::pipeline::permission::PermissionGate;
use facesense_core::shared::constants::{
    AGE_LABELS_NAME, AGE_MODEL_NAME, DETECTOR_MODEL_NAME, GENDER_LABELS_NAME, GENDER_MODEL_NAME,
    JPEG_QUALITY_PREVIEW,
};
use facesense_core::shared::face::FaceRecord;
use facesense_core::shared::frame::{Frame, Rotation};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Face detection with gender and age classification on a simulated
/// camera feed. Emits one JSON array of face records per frame.
#[derive(Parser)]
#[command(name = "facesense")]
struct Cli {
    /// Input image file, or directory of images played as a feed.
    input: PathBuf,

    /// Directory holding the detector/classifier models and label files.
    #[arg(long, default_value = "assets")]
    assets: PathBuf,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f32,

    /// Sensor rotation in degrees: 0, 90, 180 or 270.
    #[arg(long, default_value = "0")]
    rotation: i32,

    /// Feed rate in frames per second.
    #[arg(long, default_value = "10")]
    fps: u32,

    /// Use the full-range detector model (slower, wider field of view).
    #[arg(long)]
    accurate: bool,

    /// Skip gender classification.
    #[arg(long)]
    no_gender: bool,

    /// Skip age-range classification.
    #[arg(long)]
    no_age: bool,

    /// Disable face tracking IDs.
    #[arg(long)]
    no_tracking: bool,
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

    let rotation = Rotation::from_degrees(cli.rotation)
        .ok_or_else(|| format!("invalid rotation {} (expected 0/90/180/270)", cli.rotation))?;
    if cli.fps == 0 {
        return Err("fps must be at least 1".into());
    }
    let images = collect_images(&cli.input)?;
    log::info!("playing {} frame(s) from {}", images.len(), cli.input.display());

    let analyzer = build_analyzer(&cli)?;
    let interval = Duration::from_secs(1) / cli.fps;
    let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
    let camera = DirectoryCamera::new(images, rotation, interval, done_tx);

    let mut controller = DetectionController::new(
        analyzer,
        Box::new(camera),
        Box::new(AlwaysGranted),
    );
    controller.attach_host();
    controller.subscribe(Box::new(JsonLinesSink));

    let options = DetectionOptions {
        detect_gender: !cli.no_gender,
        detect_age_range: !cli.no_age,
    };
    if !controller.start_detection(options) {
        return Err("failed to start detection".into());
    }

    wait_for_feed_end(&done_rx);
    // Let the final frame drain before teardown.
    std::thread::sleep(interval);
    controller.stop_detection();
    controller.detach_host();
    Ok(())
}

fn build_analyzer(cli: &Cli) -> Result<FrameAnalyzer, Box<dyn std::error::Error>> {
    let detector_options = DetectorOptions {
        performance: if cli.accurate {
            PerformanceMode::Accurate
        } else {
            PerformanceMode::Fast
        },
        classify_attributes: true,
        enable_tracking: !cli.no_tracking,
    };
    let confidence = if (0.0..=1.0).contains(&cli.confidence) {
        cli.confidence
    } else {
        log::warn!("confidence {} out of range, using default", cli.confidence);
        DEFAULT_CONFIDENCE
    };

    let detector = OnnxFaceDetector::new(
        &assets::resolve(&cli.assets, DETECTOR_MODEL_NAME)?,
        detector_options,
        confidence,
    )?;
    let gender = build_classifier(&cli.assets, GENDER_MODEL_NAME, GENDER_LABELS_NAME)?;
    let age = build_classifier(&cli.assets, AGE_MODEL_NAME, AGE_LABELS_NAME)?;

    // Without classification the crop path never runs, so the cheaper
    // preview encoding is enough.
    let jpeg_quality = (cli.no_gender && cli.no_age).then_some(JPEG_QUALITY_PREVIEW);

    Ok(FrameAnalyzer::new(Box::new(detector), gender, age, jpeg_quality))
}

fn build_classifier(
    assets_dir: &Path,
    model_name: &str,
    labels_name: &str,
) -> Result<Classifier, Box<dyn std::error::Error>> {
    let labels = assets::load_labels(&assets::resolve(assets_dir, labels_name)?)?;
    let backend = OrtClassifierBackend::load(&assets::resolve(assets_dir, model_name)?)?;
    Ok(Classifier::new(
        ClassifierModel::with_labels(labels),
        Box::new(backend),
    ))
}

fn collect_images(input: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut images: Vec<PathBuf> = std::fs::read_dir(input)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        })
        .collect();
    images.sort();

    if images.is_empty() {
        return Err(format!("no images found in {}", input.display()).into());
    }
    Ok(images)
}

/// Blocks until the camera thread drops its end of the done channel.
fn wait_for_feed_end(done_rx: &Receiver<()>) {
    let _ = done_rx.recv();
}

/// Plays a list of image files into the feed at a fixed rate,
/// standing in for a live camera sensor.
struct DirectoryCamera {
    images: Vec<PathBuf>,
    rotation: Rotation,
    interval: Duration,
    done_tx: Option<Sender<()>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl DirectoryCamera {
    fn new(
        images: Vec<PathBuf>,
        rotation: Rotation,
        interval: Duration,
        done_tx: Sender<()>,
    ) -> Self {
        Self {
            images,
            rotation,
            interval,
            done_tx: Some(done_tx),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl CameraSource for DirectoryCamera {
    fn bind(&mut self, feed: FrameFeed) -> Result<(), BindingError> {
        if self.worker.is_some() {
            return Err(BindingError::new("camera is already bound"));
        }
        self.stop.store(false, Ordering::SeqCst);

        let images = std::mem::take(&mut self.images);
        let rotation = self.rotation;
        let interval = self.interval;
        let stop = self.stop.clone();
        let done_tx = self.done_tx.take();

        self.worker = Some(std::thread::spawn(move || {
            // done_tx is dropped on exit, signalling end of feed.
            let _done_tx = done_tx;
            for (index, path) in images.iter().enumerate() {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                let rgb = match image::open(path) {
                    Ok(img) => img.to_rgb8(),
                    Err(e) => {
                        log::warn!("skipping {}: {e}", path.display());
                        continue;
                    }
                };
                let (width, height) = rgb.dimensions();
                let frame = Frame::new(rgb.into_raw(), width, height, 3, index);
                feed.push(SensorFrame::from_rgb(&frame, rotation));
                std::thread::sleep(interval);
            }
        }));
        Ok(())
    }

    fn unbind(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Host shell without a real permission prompt.
struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn granted(&self) -> bool {
        true
    }

    fn request(&self) {}
}

/// Writes each emission as one JSON array on stdout.
struct JsonLinesSink;

impl EventSink for JsonLinesSink {
    fn emit(&self, faces: Vec<FaceRecord>) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = serde_json::to_writer(&mut out, &faces).map_err(std::io::Error::from)
            .and_then(|()| writeln!(out))
        {
            log::warn!("failed to write face records: {e}");
        }
    }
}
