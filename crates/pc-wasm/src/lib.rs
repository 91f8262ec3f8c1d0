//! WASM bridge for the product canvas.
//!
//! `mount` wires a container element to a [`pc_editor::Editor`]: DOM events
//! go in, Canvas2D frames come out. Storage is `localStorage`, the remote
//! layout endpoint is reached with `fetch`.
//!
//! Container attributes:
//! - `data-products`: JSON product list (`id`, `photoUrl`, display fields)
//! - `data-canvas-config`: optional JSON [`CanvasConfig`]
//! - `data-csrf-token`: optional, falls back to the `csrftoken` cookie
//! - `data-log-level`: optional `error`..`trace`

mod dom;
mod logger;
mod net;
mod render2d;
mod storage;

use gloo::events::{EventListener, EventListenerOptions};
use gloo::render::{AnimationFrame, request_animation_frame};
use gloo::timers::callback::Timeout;
use pc_core::CanvasConfig;
use pc_editor::{Editor, EventOutcome, InputEvent};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use storage::LocalStorage;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    CanvasRenderingContext2d, Event, HtmlCanvasElement, HtmlElement, HtmlImageElement, KeyboardEvent,
    MouseEvent, WheelEvent,
};

struct App {
    editor: RefCell<Editor<LocalStorage>>,
    container: HtmlElement,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    /// Decoded thumbnails, keyed by product id.
    images: RefCell<HashMap<String, HtmlImageElement>>,
    image_listeners: RefCell<Vec<EventListener>>,
    frame: RefCell<Option<AnimationFrame>>,
    push_timer: RefCell<Option<Timeout>>,
    /// CSS size of the canvas and the device pixel ratio it was sized for.
    size: Cell<(f64, f64, f64)>,
    alive: Cell<bool>,
}

impl App {
    fn fit_canvas(&self) {
        let dpr = web_sys::window().map_or(1.0, |w| w.device_pixel_ratio()).max(1.0);
        let width = f64::from(self.container.client_width()).max(1.0);
        let height = f64::from(self.container.client_height()).max(1.0);
        self.canvas.set_width((width * dpr).round() as u32);
        self.canvas.set_height((height * dpr).round() as u32);
        let style = self.canvas.style();
        let _ = style.set_property("width", &format!("{width}px"));
        let _ = style.set_property("height", &format!("{height}px"));
        self.size.set((width, height, dpr));
        self.editor.borrow_mut().set_canvas_size(width, height);
    }

    fn request_frame(self: &Rc<Self>) {
        if !self.alive.get() || self.frame.borrow().is_some() {
            return;
        }
        let weak = Rc::downgrade(self);
        let handle = request_animation_frame(move |_| {
            if let Some(app) = weak.upgrade() {
                app.on_frame();
            }
        });
        *self.frame.borrow_mut() = Some(handle);
    }

    fn on_frame(self: &Rc<Self>) {
        self.frame.borrow_mut().take();
        if !self.alive.get() {
            return;
        }
        self.draw();
        self.editor.borrow_mut().flush_frame(js_sys::Date::now());
        self.schedule_push();
    }

    fn draw(&self) {
        let (width, height, dpr) = self.size.get();
        let editor = self.editor.borrow();
        let images = self.images.borrow();
        let frame = render2d::Frame {
            scene: editor.scene(),
            viewport: editor.viewport(),
            images: &images,
            selection: editor.selection(),
            overlay: editor.overlay(),
            width,
            height,
            device_pixel_ratio: dpr,
            handle_size: editor.config().handle_size,
        };
        render2d::render(&self.ctx, &frame);
    }

    /// Arm the remote push timer for the editor's next due time. Re-arming
    /// replaces (and so cancels) the previous timer.
    fn schedule_push(self: &Rc<Self>) {
        let Some(due) = self.editor.borrow().next_tick_due() else {
            return;
        };
        let delay = (due - js_sys::Date::now()).max(0.0).ceil() as u32;
        let weak = Rc::downgrade(self);
        let timer = Timeout::new(delay, move || {
            if let Some(app) = weak.upgrade() {
                app.on_push_timer();
            }
        });
        *self.push_timer.borrow_mut() = Some(timer);
    }

    fn on_push_timer(self: &Rc<Self>) {
        self.push_timer.borrow_mut().take();
        if !self.alive.get() {
            return;
        }
        let request = self.editor.borrow_mut().tick(js_sys::Date::now());
        match request {
            Some(request) => {
                let weak = Rc::downgrade(self);
                spawn_local(async move {
                    let result = net::send(request).await.map(|(status, _)| status);
                    if let Some(app) = weak.upgrade().filter(|a| a.alive.get()) {
                        app.editor.borrow_mut().on_push_result(result);
                        app.schedule_push();
                    }
                });
            }
            None => self.schedule_push(),
        }
    }

    fn fetch_remote(self: &Rc<Self>) {
        let Some(request) = self.editor.borrow().remote_fetch_request() else {
            return;
        };
        let weak = Rc::downgrade(self);
        spawn_local(async move {
            let response = net::send(request).await;
            let Some(app) = weak.upgrade().filter(|a| a.alive.get()) else {
                return;
            };
            match response {
                Ok((status, body)) => {
                    if app.editor.borrow_mut().apply_remote_layout(status, &body) {
                        app.request_frame();
                    }
                }
                Err(e) => log::error!("layout fetch failed: {e}"),
            }
        });
    }

    fn load_images(self: &Rc<Self>, requests: Vec<pc_editor::loader::ImageRequest>) {
        for request in requests {
            let img = match HtmlImageElement::new() {
                Ok(img) => img,
                Err(e) => {
                    log::error!("cannot create image element: {e:?}");
                    self.editor.borrow_mut().on_image_failed(&request.product_id);
                    continue;
                }
            };
            img.set_cross_origin(Some("anonymous"));

            let weak = Rc::downgrade(self);
            let loaded = img.clone();
            let pid = request.product_id.clone();
            let on_load = EventListener::once(&img, "load", move |_| {
                let Some(app) = weak.upgrade().filter(|a| a.alive.get()) else {
                    return;
                };
                let (w, h) = (f64::from(loaded.natural_width()), f64::from(loaded.natural_height()));
                app.images.borrow_mut().insert(pid.clone(), loaded);
                if app.editor.borrow_mut().on_image_loaded(&pid, w, h) {
                    app.request_frame();
                }
            });

            let weak = Rc::downgrade(self);
            let pid = request.product_id.clone();
            let on_error = EventListener::once(&img, "error", move |_| {
                let Some(app) = weak.upgrade().filter(|a| a.alive.get()) else {
                    return;
                };
                if app.editor.borrow_mut().on_image_failed(&pid) {
                    app.request_frame();
                }
            });

            self.image_listeners.borrow_mut().extend([on_load, on_error]);
            img.set_src(&request.src);
        }
    }

    fn apply_outcome(self: &Rc<Self>, outcome: &EventOutcome, event: &Event) {
        if outcome.prevent_default {
            event.prevent_default();
        }
        let _ = self.canvas.style().set_property("cursor", outcome.cursor.css());
        if outcome.request_frame || outcome.changed {
            self.request_frame();
        }
    }

    fn dispatch(self: &Rc<Self>, input: &InputEvent, event: &Event) {
        if !self.alive.get() {
            return;
        }
        let outcome = self.editor.borrow_mut().handle_event(input);
        self.apply_outcome(&outcome, event);
    }
}

/// A mounted canvas. Dropping it (or calling `destroy`) detaches every
/// listener; late image and network callbacks are then ignored.
#[wasm_bindgen]
pub struct ProductCanvas {
    app: Rc<App>,
    listeners: Vec<EventListener>,
}

#[wasm_bindgen]
impl ProductCanvas {
    /// Current layout as JSON, or `None` if it cannot be encoded.
    #[wasm_bindgen(js_name = layoutJson)]
    pub fn layout_json(&self) -> Option<String> {
        self.app.editor.borrow().layout_json()
    }

    /// Switch tool by name (`select`, `line`, `text`, `highlight`).
    #[wasm_bindgen(js_name = setTool)]
    pub fn set_tool(&self, name: &str) -> bool {
        let Some(tool) = dom::parse_tool(name) else {
            log::warn!("unknown tool {name:?}");
            return false;
        };
        let outcome = self.app.editor.borrow_mut().set_tool(tool);
        let _ = self.app.canvas.style().set_property("cursor", outcome.cursor.css());
        self.app.request_frame();
        true
    }

    #[wasm_bindgen(js_name = resetViewport)]
    pub fn reset_viewport(&self) {
        let cmd = pc_editor::Modifiers {
            ctrl: true,
            ..pc_editor::Modifiers::NONE
        };
        let event = InputEvent::key("0", cmd);
        let outcome = self.app.editor.borrow_mut().handle_event(&event);
        if outcome.changed {
            self.app.request_frame();
        }
    }

    pub fn destroy(&mut self) {
        self.app.alive.set(false);
        self.app.editor.borrow_mut().teardown();
        self.listeners.clear();
        self.app.image_listeners.borrow_mut().clear();
        self.app.frame.borrow_mut().take();
        self.app.push_timer.borrow_mut().take();
        self.app.canvas.remove();
    }
}

/// Mount the canvas into the element with id `container_id`.
///
/// Returns `None` without touching the page when the container is absent or
/// the product list is empty.
#[wasm_bindgen]
pub fn mount(container_id: &str) -> Result<Option<ProductCanvas>, JsValue> {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return Ok(None);
    };
    let Some(container) = document
        .get_element_by_id(container_id)
        .and_then(|el| el.dyn_into::<HtmlElement>().ok())
    else {
        return Ok(None);
    };
    logger::init(logger::parse_level(container.get_attribute("data-log-level").as_deref()));

    let config = container
        .get_attribute("data-canvas-config")
        .map(|raw| CanvasConfig::from_json(&raw))
        .unwrap_or_default();
    let products = container.get_attribute("data-products");
    let mut editor = Editor::new(config, LocalStorage::open(), dom::csrf_token(&container));
    let available_width = f64::from(container.client_width());
    let requests = editor.bootstrap(products.as_deref(), available_width);
    if requests.is_empty() {
        return Ok(None);
    }

    let canvas: HtmlCanvasElement = document.create_element("canvas")?.dyn_into()?;
    canvas.set_tab_index(0);
    container.append_child(&canvas)?;
    let ctx: CanvasRenderingContext2d = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
        .dyn_into()?;

    let app = Rc::new(App {
        editor: RefCell::new(editor),
        container,
        canvas,
        ctx,
        images: RefCell::new(HashMap::new()),
        image_listeners: RefCell::new(Vec::new()),
        frame: RefCell::new(None),
        push_timer: RefCell::new(None),
        size: Cell::new((0.0, 0.0, 1.0)),
        alive: Cell::new(true),
    });
    app.fit_canvas();
    let listeners = attach_listeners(&app)?;
    app.load_images(requests);
    app.fetch_remote();
    app.request_frame();
    log::info!("product canvas mounted in #{container_id}");

    Ok(Some(ProductCanvas { app, listeners }))
}

fn listen<E, F>(target: &web_sys::EventTarget, name: &'static str, app: &Rc<App>, f: F) -> EventListener
where
    E: JsCast,
    F: Fn(&Rc<App>, &E) -> Option<InputEvent> + 'static,
{
    let weak: Weak<App> = Rc::downgrade(app);
    let options = EventListenerOptions::enable_prevent_default();
    EventListener::new_with_options(target, name, options, move |event| {
        let Some(app) = weak.upgrade() else { return };
        let Some(typed) = event.dyn_ref::<E>() else { return };
        if let Some(input) = f(&app, typed) {
            app.dispatch(&input, event);
        }
    })
}

fn attach_listeners(app: &Rc<App>) -> Result<Vec<EventListener>, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let canvas: &web_sys::EventTarget = app.canvas.as_ref();
    let mut listeners = vec![
        listen::<MouseEvent, _>(canvas, "pointerdown", app, |app, e| {
            let _ = app.canvas.focus();
            Some(dom::pointer_down(&app.canvas, e))
        }),
        listen::<MouseEvent, _>(canvas, "pointermove", app, |app, e| {
            Some(dom::pointer_move(&app.canvas, e))
        }),
        listen::<MouseEvent, _>(canvas, "pointerup", app, |app, e| Some(dom::pointer_up(&app.canvas, e))),
        listen::<MouseEvent, _>(canvas, "pointercancel", app, |app, e| {
            Some(dom::pointer_up(&app.canvas, e))
        }),
        listen::<WheelEvent, _>(canvas, "wheel", app, |app, e| Some(dom::wheel(&app.canvas, e))),
        listen::<KeyboardEvent, _>(&window, "keydown", app, |_, e| Some(dom::key(e, true))),
        listen::<KeyboardEvent, _>(&window, "keyup", app, |_, e| Some(dom::key(e, false))),
    ];
    listeners.push(EventListener::new_with_options(
        canvas,
        "contextmenu",
        EventListenerOptions::enable_prevent_default(),
        |event| event.prevent_default(),
    ));
    let weak = Rc::downgrade(app);
    listeners.push(EventListener::new(&window, "resize", move |_| {
        if let Some(app) = weak.upgrade().filter(|a| a.alive.get()) {
            app.fit_canvas();
            app.request_frame();
        }
    }));
    Ok(listeners)
}
