use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::PhysicalKey,
    window::{CursorGrabMode, Window},
};

// Import from the library crate
use drivedemo::{
    config::DriveConfig,
    controller::{input::native, DriveSim, FrameLoopContext, InputEvent, InputState},
    error::{DriveError, Result},
    logging,
    view::GpuContext,
};

struct App {
    window: Arc<Window>,
    frame_ctx: FrameLoopContext,
    egui_state: egui_winit::State,
    input: Rc<RefCell<InputState>>,
    started: std::time::Instant,
}

impl App {
    async fn new(window: Arc<Window>, config: DriveConfig) -> Result<Self> {
        let size = window.inner_size();
        let gpu = GpuContext::new_native(window.clone(), size.width, size.height).await?;

        let input = Rc::new(RefCell::new(InputState::new(config.bindings.clone())));
        let sim = DriveSim::new(config)?;
        let frame_ctx = FrameLoopContext::new(gpu, sim, input.clone());

        let egui_state = egui_winit::State::new(
            frame_ctx.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            None,
            None,
            None,
        );

        Ok(Self {
            window,
            frame_ctx,
            egui_state,
            input,
            started: std::time::Instant::now(),
        })
    }

    fn set_pointer_captured(&mut self, captured: bool) {
        if captured {
            let grabbed = self
                .window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));
            if let Err(e) = grabbed {
                tracing::warn!(error = %e, "cursor grab unavailable");
                return;
            }
        } else {
            let _ = self.window.set_cursor_grab(CursorGrabMode::None);
        }
        self.window.set_cursor_visible(!captured);
        self.input
            .borrow_mut()
            .process_event(&InputEvent::PointerLockChanged { locked: captured });
    }

    /// Returns true when the event was consumed
    fn input(&mut self, event: &WindowEvent) -> bool {
        let pointer_locked = self.input.borrow().pointer_locked;

        // egui only sees the pointer while it is free
        if !pointer_locked && self.egui_state.on_window_event(self.window.as_ref(), event).consumed {
            return true;
        }

        match event {
            WindowEvent::KeyboardInput {
                event: KeyEvent { state, physical_key: PhysicalKey::Code(code), repeat, .. },
                ..
            } => {
                let Some(event) = native::key_to_input(*code, *state == ElementState::Pressed) else {
                    return false;
                };
                if let InputEvent::KeyDown(key) = &event {
                    if self.input.borrow().bindings().is_escape(key) {
                        self.set_pointer_captured(false);
                        return true;
                    }
                }
                // winit reports auto-repeat as fresh presses
                if !*repeat {
                    self.input.borrow_mut().process_event(&event);
                }
                true
            }
            WindowEvent::MouseInput { state: ElementState::Pressed, button: MouseButton::Left, .. } => {
                if !pointer_locked {
                    self.set_pointer_captured(true);
                }
                true
            }
            WindowEvent::Focused(false) => {
                self.input.borrow_mut().process_event(&InputEvent::FocusLost);
                self.set_pointer_captured(false);
                true
            }
            WindowEvent::Occluded(occluded) => {
                self.frame_ctx.clock.borrow_mut().set_paused(*occluded);
                self.input
                    .borrow_mut()
                    .process_event(&InputEvent::VisibilityChanged { visible: !occluded });
                true
            }
            _ => false,
        }
    }

    fn handle_mouse_motion(&mut self, dx: f64, dy: f64) {
        self.input.borrow_mut().process_event(&InputEvent::MouseMove {
            dx: dx as f32,
            dy: dy as f32,
        });
    }

    fn redraw(&mut self) -> Result<()> {
        let now_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let raw_input = self.egui_state.take_egui_input(&self.window);
        let pixels_per_point = self.window.scale_factor() as f32;

        if let Some(platform_output) = self.frame_ctx.frame(now_ms, raw_input, pixels_per_point)? {
            self.egui_state.handle_platform_output(&self.window, platform_output);
        }
        Ok(())
    }
}

fn run() -> Result<()> {
    logging::init();
    let config = DriveConfig::load_or_default()?;

    let event_loop = EventLoop::new().map_err(|e| DriveError::Gpu(e.to_string()))?;
    let window_attributes = Window::default_attributes()
        .with_title("Drive Demo")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
    let window = event_loop
        .create_window(window_attributes)
        .map_err(|e| DriveError::Gpu(e.to_string()))?;
    let window = Arc::new(window);

    let mut app = pollster::block_on(App::new(window, config))?;

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { ref event, window_id } if window_id == app.window.id() => {
                if !app.input(event) {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::Resized(physical_size) => {
                            app.frame_ctx.resize(physical_size.width, physical_size.height);
                        }
                        WindowEvent::RedrawRequested => {
                            if let Err(e) = app.redraw() {
                                tracing::error!(error = %e, "render failed");
                                elwt.exit();
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::DeviceEvent { event: DeviceEvent::MouseMotion { delta }, .. } => {
                app.handle_mouse_motion(delta.0, delta.1);
            }
            Event::AboutToWait => {
                app.window.request_redraw();
            }
            _ => {}
        })
        .map_err(|e| DriveError::Gpu(e.to_string()))
}

fn main() {
    if let Err(e) = run() {
        tracing::error!(error = %e, "drive demo exited");
        eprintln!("{e}");
        std::process::exit(1);
    }
}
