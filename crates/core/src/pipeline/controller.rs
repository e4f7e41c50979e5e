use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::conversion::sensor_frame::SensorFrame;
use crate::pipeline::camera_source::CameraSource;
use crate::pipeline::event_sink::EventSink;
use crate::pipeline::frame_analyzer::{DetectionOptions, FrameAnalyzer};
use crate::pipeline::infrastructure::frame_feed::FrameFeed;
use crate::pipeline::permission::PermissionGate;

/// Pipeline lifecycle. `Starting` and `Stopping` are transient within
/// a single control call; externally the pipeline is idle or running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Starting,
    Running,
    Stopping,
}

type SharedSink = Arc<Mutex<Option<Box<dyn EventSink>>>>;

struct Worker {
    stop_tx: Sender<()>,
    join: JoinHandle<FrameAnalyzer>,
}

/// Owns the pipeline lifecycle and the command surface toward the host.
///
/// All control methods return immediately; analysis runs on a single
/// dedicated worker that pulls from the keep-latest frame feed, so at
/// most one frame is inside detect -> crop -> classify at any time.
pub struct DetectionController {
    state: PipelineState,
    attached: bool,
    camera: Box<dyn CameraSource>,
    permission: Box<dyn PermissionGate>,
    sink: SharedSink,
    analyzer: Option<FrameAnalyzer>,
    worker: Option<Worker>,
    // Worker from the last stop, still draining its in-flight frame.
    // Its analyzer is reclaimed lazily on the next start.
    parked: Option<Worker>,
    pending_start: Option<DetectionOptions>,
}

impl DetectionController {
    /// Models are loaded (inside `analyzer`) at activation time, before
    /// the controller exists; they live until the controller is dropped.
    pub fn new(
        analyzer: FrameAnalyzer,
        camera: Box<dyn CameraSource>,
        permission: Box<dyn PermissionGate>,
    ) -> Self {
        Self {
            state: PipelineState::Idle,
            attached: false,
            camera,
            permission,
            sink: Arc::new(Mutex::new(None)),
            analyzer: Some(analyzer),
            worker: None,
            parked: None,
            pending_start: None,
        }
    }

    /// Host lifecycle: an attached host is required before starting.
    pub fn attach_host(&mut self) {
        self.attached = true;
    }

    /// Host lifecycle: detaching tears the pipeline down.
    pub fn detach_host(&mut self) {
        self.stop_detection();
        self.attached = false;
    }

    /// Event-stream subscription; replaces any previous subscriber.
    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    /// Tears down the stream. In-flight results are silently dropped.
    pub fn unsubscribe(&mut self) {
        *self.sink.lock().unwrap() = None;
    }

    pub fn is_ready(&self) -> bool {
        self.attached
    }

    pub fn is_detecting(&self) -> bool {
        self.state == PipelineState::Running
    }

    pub fn has_permissions(&self) -> bool {
        self.permission.granted()
    }

    /// Starts detection.
    ///
    /// Rejected (false, no side effects) when no host is attached.
    /// Without permission the platform prompt is triggered and the
    /// request parked; a later granted [`Self::on_permission_result`]
    /// resumes it. Binding failures leave the pipeline idle.
    pub fn start_detection(&mut self, options: DetectionOptions) -> bool {
        if !self.attached {
            return false;
        }
        if self.state == PipelineState::Running {
            return true;
        }
        if !self.permission.granted() {
            self.permission.request();
            self.pending_start = Some(options);
            return false;
        }

        self.state = PipelineState::Starting;

        self.reclaim_analyzer();
        let Some(analyzer) = self.analyzer.take() else {
            log::warn!("previous frame is still draining, start rejected");
            self.state = PipelineState::Idle;
            return false;
        };

        let feed = FrameFeed::new();
        if let Err(e) = self.camera.bind(feed.clone()) {
            log::error!("{e}");
            self.analyzer = Some(analyzer);
            self.state = PipelineState::Idle;
            return false;
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let join = spawn_worker(analyzer, feed.receiver(), stop_rx, self.sink.clone(), options);
        self.worker = Some(Worker { stop_tx, join });
        self.state = PipelineState::Running;
        log::info!("detection started");
        true
    }

    /// Stops detection. Idempotent: a no-op returning true when idle.
    ///
    /// Returns without waiting for the worker. The camera is unbound
    /// immediately; work already dispatched for the last captured frame
    /// runs to completion in the background but its result may never
    /// reach a sink. The worker hands its analyzer back through the
    /// parked handle, collected on the next start.
    pub fn stop_detection(&mut self) -> bool {
        if self.state == PipelineState::Idle {
            return true;
        }
        self.state = PipelineState::Stopping;
        self.camera.unbind();

        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.try_send(());
            self.parked = Some(worker);
        }

        self.state = PipelineState::Idle;
        log::info!("detection stopped");
        true
    }

    /// Collects the analyzer from a parked worker that has finished
    /// draining. A worker still inside its last frame is left parked.
    fn reclaim_analyzer(&mut self) {
        if self.analyzer.is_some() {
            return;
        }
        let Some(worker) = self.parked.take() else {
            return;
        };
        if !worker.join.is_finished() {
            self.parked = Some(worker);
            return;
        }
        match worker.join.join() {
            Ok(analyzer) => self.analyzer = Some(analyzer),
            Err(_) => log::error!("analyzer worker panicked"),
        }
    }

    /// External permission callback. A granted result resumes the
    /// parked start request; a denial discards it.
    pub fn on_permission_result(&mut self, granted: bool) -> bool {
        let Some(options) = self.pending_start.take() else {
            return false;
        };
        if !granted {
            log::warn!("camera permission denied by the user");
            return false;
        }
        self.start_detection(options)
    }
}

impl Drop for DetectionController {
    fn drop(&mut self) {
        self.stop_detection();
    }
}

fn spawn_worker(
    mut analyzer: FrameAnalyzer,
    frames: Receiver<SensorFrame>,
    stop_rx: Receiver<()>,
    sink: SharedSink,
    options: DetectionOptions,
) -> JoinHandle<FrameAnalyzer> {
    std::thread::spawn(move || {
        loop {
            crossbeam_channel::select! {
                recv(stop_rx) -> _ => break,
                recv(frames) -> msg => match msg {
                    Ok(frame) => {
                        if let Some(records) = analyzer.analyze(&frame, &options) {
                            // The sink may have detached mid-flight; the
                            // result is then dropped, not queued.
                            if let Some(sink) = sink.lock().unwrap().as_ref() {
                                sink.emit(records);
                            }
                        }
                    }
                    Err(_) => break, // feed disconnected
                },
            }
        }
        analyzer
    })
}
