//! Native window hosting a [`ViewerSession`]

use std::sync::Arc;
use std::time::Instant;

use glbdash_client::ApiClient;
use glbdash_core::{Error, Result};
use glbdash_gpu::{FrameUniforms, SceneRenderConfig, SceneRenderer, WgpuResources};
use tokio::runtime::Handle;
use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::{ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::WindowBuilder,
};

use crate::loader::{AssetLoader, LoadQueue};
use crate::viewer::{ViewerSession, ViewerState};

const ZOOM_STEP: f32 = 0.95;

/// Window settings for [`run_viewer`]
#[derive(Debug, Clone)]
pub struct ViewerWindowOptions {
    pub title: String,
    pub width: f64,
    pub height: f64,
    pub render: SceneRenderConfig,
}

impl Default for ViewerWindowOptions {
    fn default() -> Self {
        Self {
            title: "glbdash viewer".to_string(),
            width: 1200.0,
            height: 800.0,
            render: SceneRenderConfig::default(),
        }
    }
}

#[derive(Default)]
struct PointerState {
    rotating: bool,
    panning: bool,
    last: Option<PhysicalPosition<f64>>,
}

fn window_error(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Visualization(format!("{}: {}", context, e))
}

/// Open a window showing the model at `url` until it is closed.
///
/// Network fetches and decoding run on `runtime`; the event loop picks up
/// their results without blocking. Keys: `C` toggles controls, `A` toggles
/// auto-rotation, `R` resets the camera, `L` reloads the asset, `Esc` closes.
pub fn run_viewer(runtime: Handle, client: ApiClient, url: String, options: ViewerWindowOptions) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|e| window_error("Failed to create event loop", e))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(&options.title)
            .with_inner_size(LogicalSize::new(options.width, options.height))
            .build(&event_loop)
            .map_err(|e| window_error("Failed to create window", e))?,
    );

    let mut renderer = pollster::block_on(SceneRenderer::new(window.clone(), options.render.clone()))?;
    let mut session: ViewerSession<WgpuResources> = ViewerSession::new(renderer.resources());
    let size = renderer.size();
    session.camera_mut().set_aspect_ratio(size.width, size.height);

    let loads = LoadQueue::new(AssetLoader::new(client), runtime);
    loads.request(session.set_url(Some(url)));

    let mut pointer = PointerState::default();
    let mut last_frame = Instant::now();
    let mut title = String::new();

    event_loop
        .run(move |event, target| {
            target.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, window_id } if window_id == window.id() => match event {
                    WindowEvent::CloseRequested => {
                        session.release();
                        target.exit();
                    }
                    WindowEvent::Resized(new_size) => {
                        renderer.resize(new_size);
                        session.camera_mut().set_aspect_ratio(new_size.width, new_size.height);
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        let pressed = state == ElementState::Pressed;
                        match button {
                            MouseButton::Left => pointer.rotating = pressed,
                            MouseButton::Right | MouseButton::Middle => pointer.panning = pressed,
                            _ => {}
                        }
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        if let Some(last) = pointer.last {
                            let height = renderer.size().height.max(1) as f32;
                            let dx = (position.x - last.x) as f32 / height;
                            let dy = (position.y - last.y) as f32 / height;
                            let camera = session.camera_mut();
                            if pointer.rotating {
                                camera.rotate(-dx * std::f32::consts::TAU, -dy * std::f32::consts::TAU);
                            } else if pointer.panning {
                                camera.pan(dx / camera.aspect_ratio, dy);
                            }
                        }
                        pointer.last = Some(position);
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        let steps = match delta {
                            MouseScrollDelta::LineDelta(_, y) => y,
                            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                        };
                        session.camera_mut().zoom(ZOOM_STEP.powf(steps));
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                logical_key,
                                state: ElementState::Pressed,
                                ..
                            },
                        ..
                    } => match logical_key.as_ref() {
                        Key::Named(NamedKey::Escape) => {
                            session.release();
                            target.exit();
                        }
                        Key::Character(c) => match c.to_ascii_lowercase().as_str() {
                            "c" => {
                                let enabled = session.toggle_controls();
                                tracing::info!(enabled, "orbit controls toggled");
                            }
                            "a" => {
                                let enabled = session.toggle_auto_rotate();
                                tracing::info!(enabled, "auto-rotate toggled");
                            }
                            "r" => session.camera_mut().reset(),
                            "l" => {
                                if loads.request(session.retry()) {
                                    tracing::info!("reloading model");
                                }
                            }
                            _ => {}
                        },
                        _ => {}
                    },
                    WindowEvent::RedrawRequested => {
                        loads.drain(&mut session);

                        let now = Instant::now();
                        session.frame(now - last_frame);
                        last_frame = now;

                        let mut overlay = format!("{} - {}", options.title, session.overlay());
                        if session.state() == ViewerState::Error {
                            overlay.push_str(" | Press L to reload");
                        }
                        if overlay != title {
                            window.set_title(&overlay);
                            title = overlay;
                        }

                        let camera = session.camera();
                        let frame = FrameUniforms {
                            view_proj: camera.view_projection(),
                            model: session.model_matrix(),
                            eye: camera.position(),
                        };
                        if let Err(e) = renderer.render(session.scene(), &frame) {
                            tracing::error!(error = %e, "render failed");
                        }
                    }
                    _ => {}
                },
                Event::AboutToWait => window.request_redraw(),
                _ => {}
            }
        })
        .map_err(|e| window_error("Event loop error", e))?;

    Ok(())
}
