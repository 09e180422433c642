// Re-export all public modules so they can be used from main.rs
pub mod assets;
pub mod config;
pub mod error;
pub mod logging;
pub mod ui;

// MVC Architecture
pub mod model;
pub mod view;
pub mod controller;

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
    use web_sys::{Document, Event, HtmlCanvasElement, KeyboardEvent, MouseEvent, Window};

    use crate::config::DriveConfig;
    use crate::controller::frame_loop::{self, FrameClock, FrameLoopContext};
    use crate::controller::input::{wasm, InputEvent, InputState};
    use crate::controller::simulation::DriveSim;
    use crate::logging;
    use crate::view::GpuContext;

    #[wasm_bindgen(start)]
    pub async fn start() -> Result<(), JsValue> {
        logging::init();
        let (window, document, canvas) = init_canvas()?;
        setup_app(&window, &document, &canvas).await
    }

    /// Main application setup for WASM
    async fn setup_app(
        window: &Window,
        document: &Document,
        canvas: &HtmlCanvasElement,
    ) -> Result<(), JsValue> {
        let config = DriveConfig::default();
        let (width, height) = drawable_size(window);
        canvas.set_width(width);
        canvas.set_height(height);

        let gpu = GpuContext::new(canvas, width, height).await?;
        let input = Rc::new(RefCell::new(InputState::new(config.bindings.clone())));
        let sim = DriveSim::new(config)?;
        let mut frame_ctx = FrameLoopContext::new(gpu, sim, input.clone());
        let egui_events: Rc<RefCell<Vec<egui::Event>>> = Rc::new(RefCell::new(Vec::new()));

        setup_input_listeners(
            document,
            window,
            canvas,
            input,
            frame_ctx.clock.clone(),
            frame_ctx.egui_ctx.clone(),
            egui_events.clone(),
        )?;
        tracing::info!(width, height, "drive demo started");

        // Continuous redraw using requestAnimationFrame
        let f = RcCellCallback::new(window.clone(), {
            let window = window.clone();
            let canvas = canvas.clone();

            move || {
                let (width, height) = drawable_size(&window);
                if (width, height) != frame_ctx.gpu.size() && width > 0 && height > 0 {
                    canvas.set_width(width);
                    canvas.set_height(height);
                    frame_ctx.resize(width, height);
                }

                let now = window.performance().map(|p| p.now()).unwrap_or(0.0);
                let dpr = window.device_pixel_ratio() as f32;
                let (width, height) = frame_ctx.gpu.size();
                let events = egui_events.borrow_mut().drain(..).collect();
                let raw_input = frame_loop::screen_input(width, height, dpr, now / 1000.0, events);

                if let Err(e) = frame_ctx.frame(now, raw_input, dpr) {
                    tracing::warn!(error = %e, "frame failed");
                }
            }
        });
        f.start();

        Ok(())
    }

    /// Window size in device pixels
    fn drawable_size(window: &Window) -> (u32, u32) {
        let dpr = window.device_pixel_ratio();
        let css = |v: Result<JsValue, JsValue>, fallback: f64| v.ok().and_then(|v| v.as_f64()).unwrap_or(fallback);
        let width = css(window.inner_width(), 800.0) * dpr;
        let height = css(window.inner_height(), 600.0) * dpr;
        (width as u32, height as u32)
    }

    /// Wire DOM events into the shared input state and frame clock
    fn setup_input_listeners(
        document: &Document,
        window: &Window,
        canvas: &HtmlCanvasElement,
        input: Rc<RefCell<InputState>>,
        clock: Rc<RefCell<FrameClock>>,
        egui_ctx: egui::Context,
        egui_events: Rc<RefCell<Vec<egui::Event>>>,
    ) -> Result<(), JsValue> {
        // Keyboard down
        {
            let input = input.clone();
            let document_for_exit = document.clone();
            let keydown = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                let mut state = input.borrow_mut();
                if state.bindings().is_escape(&e.key()) {
                    document_for_exit.exit_pointer_lock();
                    return;
                }
                // keep arrows and space from scrolling the page
                if state.bindings().resolve(&e.key()).is_some() {
                    e.prevent_default();
                }
                state.process_event(&wasm::keyboard_event_to_input(&e, true));
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
            keydown.forget();
        }

        // Keyboard up
        {
            let input = input.clone();
            let keyup = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                input.borrow_mut().process_event(&wasm::keyboard_event_to_input(&e, false));
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keyup", keyup.as_ref().unchecked_ref())?;
            keyup.forget();
        }

        // Focus loss - clear all keys
        {
            let input = input.clone();
            let blur = Closure::wrap(Box::new(move |_e: Event| {
                input.borrow_mut().process_event(&InputEvent::FocusLost);
            }) as Box<dyn FnMut(Event)>);
            window.add_event_listener_with_callback("blur", blur.as_ref().unchecked_ref())?;
            blur.forget();
        }

        // Hidden tab - pause the simulation and clear all keys
        {
            let input = input.clone();
            let doc_vis = document.clone();
            let visibility = Closure::wrap(Box::new(move |_e: Event| {
                let visible = !doc_vis.hidden();
                clock.borrow_mut().set_paused(!visible);
                input.borrow_mut().process_event(&InputEvent::VisibilityChanged { visible });
            }) as Box<dyn FnMut(Event)>);
            document.add_event_listener_with_callback("visibilitychange", visibility.as_ref().unchecked_ref())?;
            visibility.forget();
        }

        // Pointer lock change
        {
            let input = input.clone();
            let doc_pl = document.clone();
            let plc = Closure::wrap(Box::new(move |_e: Event| {
                let locked = doc_pl.pointer_lock_element().is_some();
                tracing::debug!(locked, "pointer lock changed");
                input.borrow_mut().process_event(&InputEvent::PointerLockChanged { locked });
            }) as Box<dyn FnMut(Event)>);
            document.add_event_listener_with_callback("pointerlockchange", plc.as_ref().unchecked_ref())?;
            plc.forget();
        }

        // Canvas click to enter pointer lock, unless the click landed on the HUD
        {
            let canvas_click = canvas.clone();
            let click = Closure::wrap(Box::new(move |_e: MouseEvent| {
                if !egui_ctx.is_pointer_over_area() {
                    canvas_click.request_pointer_lock();
                }
            }) as Box<dyn FnMut(MouseEvent)>);
            canvas.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())?;
            click.forget();
        }

        // Mouse buttons feed egui while the pointer is free
        for (event_name, pressed) in [("mousedown", true), ("mouseup", false)] {
            let input = input.clone();
            let egui_events = egui_events.clone();
            let button = Closure::wrap(Box::new(move |e: MouseEvent| {
                if input.borrow().pointer_locked {
                    return;
                }
                let pos = egui::pos2(e.client_x() as f32, e.client_y() as f32);
                if let Some(event) = frame_loop::pointer_button_event(e.button(), pos, pressed) {
                    egui_events.borrow_mut().push(event);
                }
            }) as Box<dyn FnMut(MouseEvent)>);
            document.add_event_listener_with_callback(event_name, button.as_ref().unchecked_ref())?;
            button.forget();
        }

        // Mouse move - look while captured, otherwise feed egui
        {
            let input = input.clone();
            let mm = Closure::wrap(Box::new(move |e: MouseEvent| {
                let mut state = input.borrow_mut();
                if state.pointer_locked {
                    state.process_event(&wasm::mouse_move_to_input(&e));
                } else {
                    let pos = egui::pos2(e.client_x() as f32, e.client_y() as f32);
                    egui_events.borrow_mut().push(egui::Event::PointerMoved(pos));
                }
            }) as Box<dyn FnMut(MouseEvent)>);
            document.add_event_listener_with_callback("mousemove", mm.as_ref().unchecked_ref())?;
            mm.forget();
        }

        Ok(())
    }

    fn init_canvas() -> Result<(Window, Document, HtmlCanvasElement), JsValue> {
        let window = web_sys::window().ok_or(js_error("no global `window`"))?;
        let document = window.document().ok_or(js_error("no document on window"))?;
        let body = document.body().ok_or(js_error("no body on document"))?;
        let canvas_el = document
            .create_element("canvas")?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| js_error("failed to create canvas"))?;
        canvas_el.set_attribute("style", "display:block;width:100vw;height:100vh")?;
        body.append_child(&canvas_el)?;
        Ok((window, document, canvas_el))
    }

    fn js_error<E: Into<String>>(msg: E) -> JsValue {
        JsValue::from_str(&msg.into())
    }

    struct RcCellCallback {
        inner: Rc<RefCell<Box<dyn FnMut()>>>,
        window: Window,
    }

    impl RcCellCallback {
        fn new(window: Window, f: impl FnMut() + 'static) -> Self {
            Self {
                inner: Rc::new(RefCell::new(Box::new(f))),
                window,
            }
        }

        fn start(self) {
            let inner = self.inner.clone();
            let window = self.window.clone();

            let callback = Rc::new(RefCell::new(None::<Closure<dyn FnMut()>>));
            let callback_clone = callback.clone();

            *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
                inner.borrow_mut().as_mut()();

                // Recursively schedule next frame
                if let Some(cb) = callback_clone.borrow().as_ref() {
                    if let Err(e) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                        tracing::error!(error = ?e, "requestAnimationFrame failed, loop stopped");
                    }
                }
            }) as Box<dyn FnMut()>));

            if let Some(cb) = callback.borrow().as_ref() {
                if let Err(e) = self.window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    tracing::error!(error = ?e, "requestAnimationFrame failed, loop not started");
                }
            }

            // Leak the closure to keep it alive
            std::mem::forget(callback);
        }
    }
}
