// ============================================================================
// OBSERVERS - Adaptadores DOM para infinite scroll y virtualización
// ============================================================================
// Los closures se guardan en el watcher (no se usa forget) y se sueltan
// al desconectar, para no acumular listeners en window.
// ============================================================================

use std::cell::Cell;
use std::rc::Rc;

use js_sys::Array;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    AddEventListenerOptions, Element, EventTarget, IntersectionObserver, IntersectionObserverEntry,
    IntersectionObserverInit, ResizeObserver, ResizeObserverEntry,
};

use crate::hooks::use_infinite_scroll::{should_load_more, Predicate, ScrollAxis, ScrollMetrics, ViewportWatcher};
use crate::hooks::use_virtualization::{ScrollSink, Virtualizer};

/// ¿El navegador expone IntersectionObserver?
pub fn supports_intersection_observer() -> bool {
    web_sys::window()
        .map(|window| js_sys::Reflect::has(&window, &JsValue::from_str("IntersectionObserver")).unwrap_or(false))
        .unwrap_or(false)
}

// ============================================================================
// INTERSECTION OBSERVER - Centinela al final de la lista
// ============================================================================

pub struct IntersectionWatcher {
    sentinel: Element,
    root: Option<Element>,
    root_margin: String,
    threshold: f64,
    observer: Option<IntersectionObserver>,
    callback: Option<Closure<dyn FnMut(Array)>>,
}

impl IntersectionWatcher {
    /// `root` None = viewport; margen en formato CSS ("0px 0px 100px 0px")
    pub fn new(sentinel: Element, root: Option<Element>, root_margin: &str, threshold: f64) -> Self {
        Self {
            sentinel,
            root,
            root_margin: root_margin.to_string(),
            threshold,
            observer: None,
            callback: None,
        }
    }
}

impl ViewportWatcher for IntersectionWatcher {
    fn connect(&mut self, on_trigger: Rc<dyn Fn()>) {
        self.disconnect();

        let callback = Closure::wrap(Box::new(move |entries: Array| {
            let visible = entries.iter().any(|entry| {
                entry
                    .dyn_into::<IntersectionObserverEntry>()
                    .map(|entry| entry.is_intersecting())
                    .unwrap_or(false)
            });
            if visible {
                on_trigger();
            }
        }) as Box<dyn FnMut(Array)>);

        let init = IntersectionObserverInit::new();
        if let Some(root) = &self.root {
            init.set_root(Some(root));
        }
        init.set_root_margin(&self.root_margin);
        init.set_threshold(&JsValue::from_f64(self.threshold));

        match IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init) {
            Ok(observer) => {
                observer.observe(&self.sentinel);
                self.observer = Some(observer);
                self.callback = Some(callback);
                log::debug!("🔍 IntersectionObserver conectado");
            }
            Err(e) => log::error!("❌ No se pudo crear IntersectionObserver: {:?}", e),
        }
    }

    fn disconnect(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
        self.callback = None;
    }

    fn pause(&mut self) {
        if let Some(observer) = &self.observer {
            observer.unobserve(&self.sentinel);
        }
    }

    fn resume(&mut self) {
        if let Some(observer) = &self.observer {
            observer.observe(&self.sentinel);
        }
    }
}

// ============================================================================
// SCROLL LISTENER - Distancia al final del contenedor o de la ventana
// ============================================================================

#[derive(Clone)]
pub enum ScrollContainer {
    Window,
    Element(Element),
}

impl ScrollContainer {
    pub fn metrics(&self) -> ScrollMetrics {
        match self {
            ScrollContainer::Element(element) => ScrollMetrics {
                scroll_top: f64::from(element.scroll_top()),
                scroll_left: f64::from(element.scroll_left()),
                scroll_height: f64::from(element.scroll_height()),
                scroll_width: f64::from(element.scroll_width()),
                client_height: f64::from(element.client_height()),
                client_width: f64::from(element.client_width()),
            },
            ScrollContainer::Window => window_metrics().unwrap_or_default(),
        }
    }

    fn event_target(&self) -> Option<EventTarget> {
        match self {
            ScrollContainer::Element(element) => Some(element.clone().unchecked_into()),
            ScrollContainer::Window => web_sys::window().map(JsCast::unchecked_into),
        }
    }
}

fn window_metrics() -> Option<ScrollMetrics> {
    let window = web_sys::window()?;
    let root = window.document()?.document_element()?;
    Some(ScrollMetrics {
        scroll_top: window.scroll_y().ok()?,
        scroll_left: window.scroll_x().ok()?,
        scroll_height: f64::from(root.scroll_height()),
        scroll_width: f64::from(root.scroll_width()),
        client_height: window.inner_height().ok()?.as_f64()?,
        client_width: window.inner_width().ok()?.as_f64()?,
    })
}

pub struct ScrollWatcher {
    container: ScrollContainer,
    axis: ScrollAxis,
    threshold: f64,
    paused: Rc<Cell<bool>>,
    target: Option<EventTarget>,
    callback: Option<Closure<dyn FnMut()>>,
}

impl ScrollWatcher {
    pub fn new(container: ScrollContainer, axis: ScrollAxis, threshold: f64) -> Self {
        Self {
            container,
            axis,
            threshold,
            paused: Rc::new(Cell::new(false)),
            target: None,
            callback: None,
        }
    }
}

impl ViewportWatcher for ScrollWatcher {
    fn connect(&mut self, on_trigger: Rc<dyn Fn()>) {
        self.disconnect();
        let Some(target) = self.container.event_target() else {
            log::warn!("⚠️ Contenedor de scroll no disponible");
            return;
        };

        let container = self.container.clone();
        let (axis, threshold, paused) = (self.axis, self.threshold, self.paused.clone());
        let callback = Closure::wrap(Box::new(move || {
            if !paused.get() && should_load_more(&container.metrics(), axis, threshold) {
                on_trigger();
            }
        }) as Box<dyn FnMut()>);

        let options = AddEventListenerOptions::new();
        options.set_passive(true);
        match target.add_event_listener_with_callback_and_add_event_listener_options(
            "scroll",
            callback.as_ref().unchecked_ref(),
            &options,
        ) {
            Ok(()) => {
                self.target = Some(target);
                self.callback = Some(callback);
            }
            Err(e) => log::error!("❌ No se pudo registrar el listener de scroll: {:?}", e),
        }
    }

    fn disconnect(&mut self) {
        if let (Some(target), Some(callback)) = (self.target.take(), self.callback.take()) {
            let _ = target.remove_event_listener_with_callback("scroll", callback.as_ref().unchecked_ref());
        }
    }

    fn pause(&mut self) {
        self.paused.set(true);
    }

    fn resume(&mut self) {
        self.paused.set(false);
    }

    /// La posición puede haber cambiado durante el debounce
    fn load_gate(&self) -> Option<Predicate> {
        let container = self.container.clone();
        let (axis, threshold) = (self.axis, self.threshold);
        Some(Rc::new(move || should_load_more(&container.metrics(), axis, threshold)))
    }
}

// ============================================================================
// VIRTUALIZACIÓN - Tamaño del contenedor y scroll programático
// ============================================================================

/// Mantiene `container_size` del virtualizer al día con el alto del elemento
pub struct ResizeWatcher {
    observer: ResizeObserver,
    _callback: Closure<dyn FnMut(Array)>,
}

impl ResizeWatcher {
    pub fn observe(element: &Element, virtualizer: Rc<Virtualizer>) -> Result<Self, JsValue> {
        let callback = Closure::wrap(Box::new(move |entries: Array| {
            for entry in entries.iter() {
                if let Ok(entry) = entry.dyn_into::<ResizeObserverEntry>() {
                    virtualizer.set_container_size(entry.content_rect().height());
                }
            }
        }) as Box<dyn FnMut(Array)>);

        let observer = ResizeObserver::new(callback.as_ref().unchecked_ref())?;
        observer.observe(element);
        Ok(Self { observer, _callback: callback })
    }
}

impl Drop for ResizeWatcher {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// Sink de scroll programático sobre un elemento
pub fn element_scroll_sink(element: Element) -> ScrollSink {
    Rc::new(move |offset: f64| element.set_scroll_top(offset.round() as i32))
}

/// Reenvía los eventos de scroll del elemento al virtualizer
pub struct VirtualScrollListener {
    element: Element,
    callback: Closure<dyn FnMut()>,
}

impl VirtualScrollListener {
    pub fn attach(element: Element, virtualizer: Rc<Virtualizer>) -> Result<Self, JsValue> {
        let source = element.clone();
        let callback = Closure::wrap(Box::new(move || {
            virtualizer.handle_scroll(f64::from(source.scroll_top()), f64::from(source.scroll_left()));
        }) as Box<dyn FnMut()>);

        let options = AddEventListenerOptions::new();
        options.set_passive(true);
        element.add_event_listener_with_callback_and_add_event_listener_options(
            "scroll",
            callback.as_ref().unchecked_ref(),
            &options,
        )?;
        Ok(Self { element, callback })
    }
}

impl Drop for VirtualScrollListener {
    fn drop(&mut self) {
        let _ = self
            .element
            .remove_event_listener_with_callback("scroll", self.callback.as_ref().unchecked_ref());
    }
}
