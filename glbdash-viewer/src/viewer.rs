//! Viewer session state machine
//!
//! A [`ViewerSession`] tracks which asset URL is shown and owns the one
//! GPU-resident scene currently displayed. Loading is driven from outside:
//! [`ViewerSession::set_url`] hands out a [`LoadTicket`], and the caller
//! reports the fetched and decoded asset back through
//! [`ViewerSession::complete`]. Only the most recently issued ticket is
//! accepted.

use std::f32::consts::TAU;
use std::fmt;
use std::time::Duration;

use glbdash_core::Result;
use glbdash_gpu::{GpuResources, GpuScene, ReleaseStats, SceneData};
use nalgebra::{Matrix4, Vector3};

use crate::camera::OrbitCamera;

/// Auto-rotation speed around the vertical axis, radians per second
pub const AUTO_ROTATE_SPEED: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Permission to deliver one load result for `url`
#[derive(Debug, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    url: String,
}

impl LoadTicket {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Notification sent to observers when a load settles
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Loaded { url: String, nodes: usize, triangles: usize },
    Failed { url: String, message: String },
}

type Observer = Box<dyn FnMut(&ViewerEvent)>;

/// One mounted viewer: current URL, load state, interaction flags and the
/// displayed scene
pub struct ViewerSession<R: GpuResources> {
    resources: R,
    url: Option<String>,
    state: ViewerState,
    error: Option<String>,
    generation: u64,
    pending: Option<u64>,
    scene: Option<GpuScene<R>>,
    camera: OrbitCamera,
    auto_rotate: bool,
    rotation_y: f32,
    observers: Vec<Observer>,
}

impl<R: GpuResources> ViewerSession<R> {
    pub fn new(resources: R) -> Self {
        Self {
            resources,
            url: None,
            state: ViewerState::Idle,
            error: None,
            generation: 0,
            pending: None,
            scene: None,
            camera: OrbitCamera::default(),
            auto_rotate: true,
            rotation_y: 0.0,
            observers: Vec::new(),
        }
    }

    /// Register a callback for load and error notifications
    pub fn subscribe(&mut self, observer: impl FnMut(&ViewerEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Point the viewer at a new asset.
    ///
    /// Setting the current URL again does nothing. `None` releases the
    /// displayed scene and returns to [`ViewerState::Idle`]. Any other URL
    /// enters [`ViewerState::Loading`] and returns the ticket its result must
    /// be delivered with; tickets issued earlier become stale.
    pub fn set_url(&mut self, url: Option<String>) -> Option<LoadTicket> {
        if url == self.url {
            return None;
        }
        self.generation += 1;
        self.url = url;
        self.error = None;

        match self.url.clone() {
            None => {
                self.pending = None;
                self.release();
                self.state = ViewerState::Idle;
                tracing::debug!("viewer cleared");
                None
            }
            Some(url) => {
                self.pending = Some(self.generation);
                self.state = ViewerState::Loading;
                tracing::info!(%url, generation = self.generation, "loading model");
                Some(LoadTicket {
                    generation: self.generation,
                    url,
                })
            }
        }
    }

    /// Issue a fresh ticket for the current URL, e.g. after a failed load
    pub fn retry(&mut self) -> Option<LoadTicket> {
        let url = self.url.clone()?;
        self.generation += 1;
        self.pending = Some(self.generation);
        self.state = ViewerState::Loading;
        self.error = None;
        Some(LoadTicket {
            generation: self.generation,
            url,
        })
    }

    /// Deliver the outcome of a load.
    ///
    /// Returns `false` and changes nothing when the ticket is stale. On
    /// success the new scene is uploaded before the previous one is
    /// released. On failure the previous scene is kept.
    pub fn complete(&mut self, ticket: LoadTicket, result: Result<SceneData>) -> bool {
        if self.pending != Some(ticket.generation) {
            tracing::debug!(
                url = %ticket.url,
                generation = ticket.generation,
                current = self.generation,
                "discarding stale load"
            );
            return false;
        }
        self.pending = None;

        let uploaded = result.and_then(|data| {
            let scene = GpuScene::upload(&data, &mut self.resources)?;
            Ok((scene, data.triangle_count()))
        });

        let event = match uploaded {
            Ok((scene, triangles)) => {
                let nodes = scene.nodes().len();
                if let Some(previous) = self.scene.replace(scene) {
                    previous.dispose(&mut self.resources);
                }
                self.state = ViewerState::Ready;
                self.error = None;
                self.rotation_y = 0.0;
                tracing::info!(url = %ticket.url, nodes, triangles, "model ready");
                ViewerEvent::Loaded {
                    url: ticket.url,
                    nodes,
                    triangles,
                }
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(url = %ticket.url, error = %message, "failed to load model");
                self.state = ViewerState::Error;
                self.error = Some(message.clone());
                ViewerEvent::Failed {
                    url: ticket.url,
                    message,
                }
            }
        };

        for observer in &mut self.observers {
            observer(&event);
        }
        true
    }

    /// Advance auto-rotation by `elapsed`. Returns the current Y rotation.
    pub fn frame(&mut self, elapsed: Duration) -> f32 {
        if self.auto_rotate && self.state == ViewerState::Ready {
            self.rotation_y = (self.rotation_y + AUTO_ROTATE_SPEED * elapsed.as_secs_f32()).rem_euclid(TAU);
        }
        self.rotation_y
    }

    /// Release the displayed scene, if any
    pub fn release(&mut self) -> ReleaseStats {
        match self.scene.take() {
            Some(scene) => scene.dispose(&mut self.resources),
            None => ReleaseStats::default(),
        }
    }

    /// Tear the viewer down, releasing everything it holds
    pub fn unmount(mut self) -> ReleaseStats {
        self.pending = None;
        self.release()
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.state == ViewerState::Loading
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn scene(&self) -> Option<&GpuScene<R>> {
        self.scene.as_ref()
    }

    pub fn resources(&self) -> &R {
        &self.resources
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    pub fn rotation_y(&self) -> f32 {
        self.rotation_y
    }

    /// Rotation applied to the displayed model
    pub fn model_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_axis_angle(&Vector3::y_axis(), self.rotation_y)
    }

    pub fn controls_enabled(&self) -> bool {
        self.camera.controls.all_enabled()
    }

    pub fn set_controls_enabled(&mut self, enabled: bool) {
        self.camera.controls.set_enabled(enabled);
    }

    pub fn toggle_controls(&mut self) -> bool {
        let enabled = !self.controls_enabled();
        self.set_controls_enabled(enabled);
        enabled
    }

    pub fn auto_rotate(&self) -> bool {
        self.auto_rotate
    }

    pub fn set_auto_rotate(&mut self, enabled: bool) {
        self.auto_rotate = enabled;
    }

    pub fn toggle_auto_rotate(&mut self) -> bool {
        self.auto_rotate = !self.auto_rotate;
        self.auto_rotate
    }

    /// Status line for the viewer overlay
    pub fn overlay(&self) -> Overlay<'_> {
        match self.state {
            ViewerState::Idle => Overlay::Empty,
            ViewerState::Loading => Overlay::Loading,
            ViewerState::Error => Overlay::Failed(self.error.as_deref().unwrap_or_default()),
            ViewerState::Ready => Overlay::Controls {
                enabled: self.controls_enabled(),
                auto_rotate: self.auto_rotate,
            },
        }
    }
}

impl<R: GpuResources> Drop for ViewerSession<R> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Overlay text shown over the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay<'a> {
    Empty,
    Loading,
    Failed(&'a str),
    Controls { enabled: bool, auto_rotate: bool },
}

impl fmt::Display for Overlay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Overlay::Empty => write!(f, "Select a model to preview"),
            Overlay::Loading => write!(f, "Loading 3D Model..."),
            Overlay::Failed(reason) if reason.is_empty() => write!(f, "Failed to load model"),
            Overlay::Failed(reason) => write!(f, "Failed to load model: {}", reason),
            Overlay::Controls { enabled: false, .. } => write!(f, "Controls disabled"),
            Overlay::Controls { auto_rotate, .. } => {
                write!(f, "Drag to rotate | Scroll to zoom")?;
                if *auto_rotate {
                    write!(f, " | Auto-rotating")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glbdash_core::Error;
    use glbdash_gpu::{MaterialData, MaterialSlots, MeshVertex, PrimitiveData, SceneNode};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counter {
        next: u32,
        live: Vec<u32>,
        released: Vec<u32>,
    }

    impl Counter {
        fn handle(&mut self) -> u32 {
            self.next += 1;
            self.live.push(self.next);
            self.next
        }

        fn release(&mut self, handle: u32) {
            assert!(!self.released.contains(&handle), "handle {handle} released twice");
            self.live.retain(|h| *h != handle);
            self.released.push(handle);
        }
    }

    impl GpuResources for Counter {
        type Geometry = u32;
        type Material = u32;

        fn upload_geometry(&mut self, _node: &SceneNode) -> Result<u32> {
            Ok(self.handle())
        }

        fn upload_material(&mut self, _material: &MaterialData) -> Result<u32> {
            Ok(self.handle())
        }

        fn release_geometry(&mut self, geometry: u32) {
            self.release(geometry);
        }

        fn release_material(&mut self, material: u32) {
            self.release(material);
        }
    }

    fn scene(materials: usize) -> SceneData {
        let vertex = MeshVertex {
            position: [0.0; 3],
            normal: [0.0, 1.0, 0.0],
        };
        let primitives = (0..materials)
            .map(|slot| PrimitiveData {
                vertices: vec![vertex; 3],
                indices: vec![0, 1, 2],
                material_slot: slot,
            })
            .collect();
        let materials = if materials == 1 {
            MaterialSlots::Single(MaterialData::default())
        } else {
            MaterialSlots::Multiple(vec![MaterialData::default(); materials])
        };
        SceneData {
            nodes: vec![SceneNode {
                name: None,
                primitives,
                materials,
            }],
            bounds: None,
        }
    }

    fn url(name: &str) -> Option<String> {
        Some(format!("http://localhost:5000/api/upload/file/{name}"))
    }

    #[test]
    fn test_starts_idle() {
        let session = ViewerSession::new(Counter::default());
        assert_eq!(session.state(), ViewerState::Idle);
        assert!(session.auto_rotate());
        assert!(session.controls_enabled());
        assert_eq!(session.overlay(), Overlay::Empty);
    }

    #[test]
    fn test_load_reaches_ready() {
        let mut session = ViewerSession::new(Counter::default());
        let ticket = session.set_url(url("a")).unwrap();
        assert!(session.is_loading());
        assert_eq!(session.overlay().to_string(), "Loading 3D Model...");

        assert!(session.complete(ticket, Ok(scene(1))));
        assert_eq!(session.state(), ViewerState::Ready);
        assert!(!session.has_error());
        assert_eq!(session.resources().live.len(), 2);
    }

    #[test]
    fn test_same_url_is_noop() {
        let mut session = ViewerSession::new(Counter::default());
        let ticket = session.set_url(url("a")).unwrap();
        assert!(session.set_url(url("a")).is_none());
        assert!(session.complete(ticket, Ok(scene(1))));
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut session = ViewerSession::new(Counter::default());
        let first = session.set_url(url("a")).unwrap();
        let second = session.set_url(url("b")).unwrap();

        assert!(!session.complete(first, Ok(scene(1))));
        assert_eq!(session.state(), ViewerState::Loading);
        assert!(session.scene().is_none());
        assert!(session.resources().live.is_empty());

        assert!(session.complete(second, Ok(scene(1))));
        assert_eq!(session.url(), url("b").as_deref());
        assert_eq!(session.state(), ViewerState::Ready);
    }

    #[test]
    fn test_stale_failure_does_not_set_error() {
        let mut session = ViewerSession::new(Counter::default());
        let first = session.set_url(url("a")).unwrap();
        let _second = session.set_url(url("b")).unwrap();

        assert!(!session.complete(first, Err(Error::Decode("truncated".into()))));
        assert!(!session.has_error());
        assert_eq!(session.state(), ViewerState::Loading);
    }

    #[test]
    fn test_switching_assets_releases_previous_once() {
        let mut session = ViewerSession::new(Counter::default());
        let ticket = session.set_url(url("a")).unwrap();
        session.complete(ticket, Ok(scene(2)));
        let first_handles = session.resources().live.clone();
        assert_eq!(first_handles.len(), 3);

        let ticket = session.set_url(url("b")).unwrap();
        assert_eq!(session.resources().live, first_handles);
        session.complete(ticket, Ok(scene(1)));

        let counter = session.resources();
        assert_eq!(counter.released, first_handles);
        assert_eq!(counter.live.len(), 2);
    }

    #[test]
    fn test_failure_keeps_previous_scene() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut session = ViewerSession::new(Counter::default());
        let sink = seen.clone();
        session.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        let ticket = session.set_url(url("a")).unwrap();
        session.complete(ticket, Ok(scene(1)));
        let ticket = session.set_url(url("b")).unwrap();
        session.complete(ticket, Err(Error::Decode("invalid glTF".into())));

        assert_eq!(session.state(), ViewerState::Error);
        assert!(!session.is_loading());
        assert_eq!(session.error(), Some("Failed to decode model: invalid glTF"));
        assert!(session.scene().is_some());
        assert!(session.resources().released.is_empty());

        let events = seen.borrow();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ViewerEvent::Loaded { nodes: 1, triangles: 1, .. }));
        assert!(matches!(&events[1], ViewerEvent::Failed { url, .. } if url.ends_with("/b")));
    }

    #[test]
    fn test_clearing_url_releases_scene() {
        let mut session = ViewerSession::new(Counter::default());
        let ticket = session.set_url(url("a")).unwrap();
        session.complete(ticket, Ok(scene(2)));

        assert!(session.set_url(None).is_none());
        assert_eq!(session.state(), ViewerState::Idle);
        assert!(session.resources().live.is_empty());
        assert_eq!(session.resources().released.len(), 3);
    }

    #[test]
    fn test_unmount_releases_scene_once() {
        let mut session = ViewerSession::new(Counter::default());
        let ticket = session.set_url(url("a")).unwrap();
        session.complete(ticket, Ok(scene(2)));

        let stats = session.unmount();
        assert_eq!(stats, ReleaseStats { geometries: 1, materials: 2 });
    }

    #[test]
    fn test_retry_after_failure() {
        let mut session = ViewerSession::new(Counter::default());
        let ticket = session.set_url(url("a")).unwrap();
        session.complete(ticket, Err(Error::network("Request timed out")));

        let ticket = session.retry().unwrap();
        assert_eq!(ticket.url(), url("a").unwrap());
        assert!(!session.has_error());
        assert!(session.complete(ticket, Ok(scene(1))));
        assert_eq!(session.state(), ViewerState::Ready);
    }

    #[test]
    fn test_auto_rotation_scales_with_time() {
        let mut session = ViewerSession::new(Counter::default());
        assert_eq!(session.frame(Duration::from_secs(1)), 0.0);

        let ticket = session.set_url(url("a")).unwrap();
        session.complete(ticket, Ok(scene(1)));
        session.frame(Duration::from_millis(500));
        session.frame(Duration::from_millis(500));
        assert_relative_eq!(session.rotation_y(), 0.5, epsilon = 1e-6);

        session.set_auto_rotate(false);
        session.frame(Duration::from_secs(2));
        assert_relative_eq!(session.rotation_y(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_toggle_controls_updates_overlay() {
        let mut session = ViewerSession::new(Counter::default());
        let ticket = session.set_url(url("a")).unwrap();
        session.complete(ticket, Ok(scene(1)));
        session.set_auto_rotate(false);
        assert_eq!(session.overlay().to_string(), "Drag to rotate | Scroll to zoom");

        assert!(!session.toggle_controls());
        assert_eq!(session.overlay().to_string(), "Controls disabled");
        assert!(!session.camera().controls.enable_pan);
    }
}
