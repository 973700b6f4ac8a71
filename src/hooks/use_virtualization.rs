// ============================================================================
// USE VIRTUALIZATION - Windowing de listas grandes
// ============================================================================
// Calcula qué índices renderizar según scroll, tamaño del contenedor y
// overscan. Las alturas pueden ser fijas o medidas por ítem (con caché).
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::hooks::use_infinite_scroll::ScrollAxis;
use crate::utils::scheduler::{TimerHandle, Timers};

pub type MeasureFn = Rc<dyn Fn(usize) -> f64>;
pub type ScrollSink = Rc<dyn Fn(f64)>;

/// Altura de los ítems
#[derive(Clone)]
pub enum ItemSize {
    Fixed(f64),
    /// Medida por índice; `estimated` se usa para estimar cuántos caben
    Dynamic { estimated: f64, measure: MeasureFn },
}

#[derive(Clone)]
pub struct VirtualizationOptions {
    pub item_size: ItemSize,
    pub container_size: f64,
    pub overscan: usize,
    pub scroll_idle_ms: u32,
    pub axis: ScrollAxis,
}

impl Default for VirtualizationOptions {
    fn default() -> Self {
        Self {
            item_size: ItemSize::Fixed(50.0),
            container_size: 400.0,
            overscan: 5,
            scroll_idle_ms: 16,
            axis: ScrollAxis::Vertical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollDirection {
    #[default]
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Start,
    Center,
    End,
    /// Solo desplaza si el ítem está fuera del viewport
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualItem {
    pub index: usize,
    pub offset: f64,
    pub size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRange {
    /// Incluye overscan
    pub start: usize,
    pub end: usize,
    pub start_visible: usize,
    pub end_visible: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollState {
    pub scroll_top: f64,
    pub scroll_left: f64,
    pub container_size: f64,
    pub is_scrolling: bool,
    pub direction: ScrollDirection,
}

pub struct Virtualizer {
    options: VirtualizationOptions,
    item_count: Cell<usize>,
    size_cache: RefCell<HashMap<usize, f64>>,
    offsets: RefCell<Option<Rc<Vec<f64>>>>,
    state: Rc<RefCell<ScrollState>>,
    idle_timer: RefCell<Option<TimerHandle>>,
    scroll_sink: RefCell<Option<ScrollSink>>,
    timers: Timers,
}

impl Virtualizer {
    pub fn new(options: VirtualizationOptions, item_count: usize, timers: Timers) -> Self {
        let state = ScrollState { container_size: options.container_size, ..ScrollState::default() };
        Self {
            options,
            item_count: Cell::new(item_count),
            size_cache: RefCell::new(HashMap::new()),
            offsets: RefCell::new(None),
            state: Rc::new(RefCell::new(state)),
            idle_timer: RefCell::new(None),
            scroll_sink: RefCell::new(None),
            timers,
        }
    }

    pub fn item_count(&self) -> usize {
        self.item_count.get()
    }

    pub fn state(&self) -> ScrollState {
        *self.state.borrow()
    }

    pub fn is_scrolling(&self) -> bool {
        self.state.borrow().is_scrolling
    }

    /// Destino de `scroll_to_index` (normalmente el contenedor DOM)
    pub fn set_scroll_sink(&self, sink: Option<ScrollSink>) {
        *self.scroll_sink.borrow_mut() = sink;
    }

    /// Un cambio de longitud invalida la caché de alturas
    pub fn set_item_count(&self, count: usize) {
        if self.item_count.replace(count) != count {
            self.reset_height_cache();
        }
    }

    pub fn set_container_size(&self, size: f64) {
        self.state.borrow_mut().container_size = size;
    }

    pub fn item_size(&self, index: usize) -> f64 {
        match &self.options.item_size {
            ItemSize::Fixed(height) => *height,
            ItemSize::Dynamic { measure, .. } => {
                if let Some(height) = self.size_cache.borrow().get(&index) {
                    return *height;
                }
                let height = measure(index);
                self.size_cache.borrow_mut().insert(index, height);
                height
            }
        }
    }

    fn average_size(&self) -> f64 {
        match &self.options.item_size {
            ItemSize::Fixed(height) => *height,
            ItemSize::Dynamic { estimated, .. } => *estimated,
        }
    }

    /// Sumas acumuladas: offsets[i] = inicio del ítem i; offsets[len] = total
    fn offsets(&self) -> Rc<Vec<f64>> {
        if let Some(offsets) = self.offsets.borrow().as_ref() {
            return offsets.clone();
        }
        let count = self.item_count.get();
        let mut offsets = Vec::with_capacity(count + 1);
        let mut acc = 0.0;
        offsets.push(acc);
        for index in 0..count {
            acc += self.item_size(index);
            offsets.push(acc);
        }
        let offsets = Rc::new(offsets);
        *self.offsets.borrow_mut() = Some(offsets.clone());
        offsets
    }

    pub fn offset_for_index(&self, index: usize) -> f64 {
        match &self.options.item_size {
            ItemSize::Fixed(height) => index as f64 * height,
            ItemSize::Dynamic { .. } => {
                let offsets = self.offsets();
                offsets[index.min(offsets.len() - 1)]
            }
        }
    }

    fn scroll_position(&self) -> f64 {
        let state = self.state.borrow();
        match self.options.axis {
            ScrollAxis::Vertical => state.scroll_top,
            ScrollAxis::Horizontal => state.scroll_left,
        }
    }

    /// Primer índice visible
    pub fn start_index(&self) -> usize {
        let count = self.item_count.get();
        if count == 0 {
            return 0;
        }
        let position = self.scroll_position();
        let start = match &self.options.item_size {
            ItemSize::Fixed(height) if *height > 0.0 => (position / height).floor().max(0.0) as usize,
            ItemSize::Fixed(_) => 0,
            ItemSize::Dynamic { .. } => {
                // Último ítem que empieza antes de la posición actual
                let offsets = self.offsets();
                let before = offsets[..count].partition_point(|offset| *offset < position);
                before.saturating_sub(1)
            }
        };
        start.min(count - 1)
    }

    pub fn visible_count(&self) -> usize {
        let average = self.average_size();
        let fitting = if average > 0.0 { (self.state.borrow().container_size / average).ceil() as usize } else { 0 };
        fitting + self.options.overscan * 2
    }

    pub fn end_index(&self) -> usize {
        let count = self.item_count.get();
        if count == 0 {
            return 0;
        }
        (count - 1).min(self.start_index() + self.visible_count())
    }

    pub fn visible_range(&self) -> VisibleRange {
        let count = self.item_count.get();
        let start_visible = self.start_index();
        let end_visible = self.end_index();
        VisibleRange {
            start: start_visible.saturating_sub(self.options.overscan),
            end: (end_visible + self.options.overscan).min(count.saturating_sub(1)),
            start_visible,
            end_visible,
        }
    }

    /// Ítems a renderizar (con overscan) y su posición
    pub fn visible_items(&self) -> Vec<VirtualItem> {
        if self.item_count.get() == 0 {
            return Vec::new();
        }
        let range = self.visible_range();
        (range.start..=range.end)
            .map(|index| VirtualItem { index, offset: self.offset_for_index(index), size: self.item_size(index) })
            .collect()
    }

    pub fn total_size(&self) -> f64 {
        let count = self.item_count.get();
        match &self.options.item_size {
            ItemSize::Fixed(height) => count as f64 * height,
            ItemSize::Dynamic { .. } => self.offsets()[count],
        }
    }

    /// Desplazamiento del primer ítem renderizado
    pub fn offset_y(&self) -> f64 {
        self.offset_for_index(self.visible_range().start)
    }

    pub fn is_index_visible(&self, index: usize) -> bool {
        let range = self.visible_range();
        index >= range.start_visible && index <= range.end_visible
    }

    /// Evento de scroll del contenedor
    pub fn handle_scroll(&self, scroll_top: f64, scroll_left: f64) {
        {
            let mut state = self.state.borrow_mut();
            state.direction = if scroll_top > state.scroll_top { ScrollDirection::Down } else { ScrollDirection::Up };
            state.scroll_top = scroll_top;
            state.scroll_left = scroll_left;
            state.is_scrolling = true;
        }

        drop(self.idle_timer.borrow_mut().take());
        let weak = Rc::downgrade(&self.state);
        let timer = self.timers.schedule(self.options.scroll_idle_ms, move || {
            if let Some(state) = weak.upgrade() {
                state.borrow_mut().is_scrolling = false;
            }
        });
        *self.idle_timer.borrow_mut() = Some(timer);
    }

    pub fn update_item_height(&self, index: usize, height: f64) {
        if let ItemSize::Dynamic { .. } = self.options.item_size {
            self.size_cache.borrow_mut().insert(index, height);
            self.offsets.borrow_mut().take();
        }
    }

    /// Posición de scroll que muestra `index`; None si no hay que moverse
    pub fn scroll_to_index(&self, index: usize, align: Align) -> Option<f64> {
        if index >= self.item_count.get() {
            return None;
        }
        let offset = self.offset_for_index(index);
        let size = self.item_size(index);
        let container = self.state.borrow().container_size;

        let target = match align {
            Align::Start => offset,
            Align::Center => offset - (container - size) / 2.0,
            Align::End => offset - container + size,
            Align::Auto => {
                let viewport_start = self.scroll_position();
                let viewport_end = viewport_start + container;
                if offset < viewport_start {
                    offset
                } else if offset + size > viewport_end {
                    offset + size - container
                } else {
                    return None;
                }
            }
        };
        let target = target.max(0.0);

        let sink = self.scroll_sink.borrow().clone();
        if let Some(sink) = sink {
            sink(target);
        }
        Some(target)
    }

    pub fn reset_height_cache(&self) {
        self.size_cache.borrow_mut().clear();
        self.offsets.borrow_mut().take();
    }

    pub fn cleanup(&self) {
        drop(self.idle_timer.borrow_mut().take());
        self.scroll_sink.borrow_mut().take();
    }
}

// ============================================================================
// TABLA VIRTUALIZADA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualRow {
    pub index: usize,
    pub offset: f64,
    pub height: f64,
    pub is_even: bool,
}

/// Tabla con cabecera y pie fijos; el cuerpo se virtualiza
pub struct VirtualTable {
    virtualizer: Virtualizer,
    pub row_height: f64,
    pub header_height: f64,
    pub footer_height: f64,
    horizontal_offset: Cell<f64>,
    header_sink: RefCell<Option<ScrollSink>>,
    footer_sink: RefCell<Option<ScrollSink>>,
}

impl VirtualTable {
    pub fn new(
        row_height: f64,
        header_height: f64,
        footer_height: f64,
        container_height: f64,
        overscan: usize,
        row_count: usize,
        timers: Timers,
    ) -> Self {
        let options = VirtualizationOptions {
            item_size: ItemSize::Fixed(row_height),
            container_size: container_height - header_height - footer_height,
            overscan,
            ..VirtualizationOptions::default()
        };
        Self {
            virtualizer: Virtualizer::new(options, row_count, timers),
            row_height,
            header_height,
            footer_height,
            horizontal_offset: Cell::new(0.0),
            header_sink: RefCell::new(None),
            footer_sink: RefCell::new(None),
        }
    }

    /// Con los valores por defecto: filas 50, cabecera 56, sin pie
    pub fn with_defaults(container_height: f64, row_count: usize, timers: Timers) -> Self {
        Self::new(50.0, 56.0, 0.0, container_height, 5, row_count, timers)
    }

    pub fn virtualizer(&self) -> &Virtualizer {
        &self.virtualizer
    }

    pub fn body_height(&self) -> f64 {
        self.virtualizer.state().container_size
    }

    pub fn visible_rows(&self) -> Vec<VirtualRow> {
        self.virtualizer
            .visible_items()
            .into_iter()
            .map(|item| VirtualRow { index: item.index, offset: item.offset, height: item.size, is_even: item.index % 2 == 0 })
            .collect()
    }

    /// Destino del scroll horizontal de la cabecera (su `scrollLeft`)
    pub fn set_header_scroll_sink(&self, sink: Option<ScrollSink>) {
        *self.header_sink.borrow_mut() = sink;
    }

    pub fn set_footer_scroll_sink(&self, sink: Option<ScrollSink>) {
        *self.footer_sink.borrow_mut() = sink;
    }

    /// Último desplazamiento horizontal aplicado a cabecera y pie
    pub fn horizontal_offset(&self) -> f64 {
        self.horizontal_offset.get()
    }

    /// Scroll del cuerpo: cabecera y pie siguen su desplazamiento horizontal
    pub fn sync_horizontal_scroll(&self, scroll_top: f64, scroll_left: f64) {
        self.horizontal_offset.set(scroll_left);
        let sinks = [self.header_sink.borrow().clone(), self.footer_sink.borrow().clone()];
        for sink in sinks.into_iter().flatten() {
            sink(scroll_left);
        }
        self.virtualizer.handle_scroll(scroll_top, scroll_left);
    }
}

// ============================================================================
// LISTA AGRUPADA
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FlatRow<T> {
    GroupHeader { key: String, count: usize },
    Item { item: T, original_index: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemGroup<T> {
    pub key: String,
    pub start_index: usize,
    pub items: Vec<(usize, T)>,
}

/// Agrupa conservando el orden de primera aparición de cada clave
pub fn group_items<T: Clone>(items: &[T], group_key: impl Fn(&T) -> String) -> Vec<ItemGroup<T>> {
    let mut groups: Vec<ItemGroup<T>> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (index, item) in items.iter().enumerate() {
        let key = group_key(item);
        let position = *positions.entry(key.clone()).or_insert_with(|| {
            groups.push(ItemGroup { key, start_index: index, items: Vec::new() });
            groups.len() - 1
        });
        groups[position].items.push((index, item.clone()));
    }
    groups
}

pub fn flatten_groups<T: Clone>(groups: &[ItemGroup<T>]) -> Vec<FlatRow<T>> {
    let mut rows = Vec::new();
    for group in groups {
        rows.push(FlatRow::GroupHeader { key: group.key.clone(), count: group.items.len() });
        rows.extend(
            group.items.iter().map(|(original_index, item)| FlatRow::Item { item: item.clone(), original_index: *original_index }),
        );
    }
    rows
}

/// Lista virtual con filas de cabecera de grupo de altura propia
pub struct VirtualGroupedList<T> {
    rows: Rc<RefCell<Vec<FlatRow<T>>>>,
    groups: Vec<ItemGroup<T>>,
    virtualizer: Virtualizer,
}

impl<T: Clone + 'static> VirtualGroupedList<T> {
    pub fn new(
        items: &[T],
        group_key: impl Fn(&T) -> String,
        group_header_height: f64,
        item_height: f64,
        container_size: f64,
        timers: Timers,
    ) -> Self {
        let groups = group_items(items, group_key);
        let rows = Rc::new(RefCell::new(flatten_groups(&groups)));

        let heights = rows.clone();
        let measure: MeasureFn = Rc::new(move |index| match heights.borrow().get(index) {
            Some(FlatRow::GroupHeader { .. }) => group_header_height,
            _ => item_height,
        });
        let options = VirtualizationOptions {
            item_size: ItemSize::Dynamic { estimated: item_height, measure },
            container_size,
            ..VirtualizationOptions::default()
        };
        let count = rows.borrow().len();
        Self { rows, groups, virtualizer: Virtualizer::new(options, count, timers) }
    }

    pub fn groups(&self) -> &[ItemGroup<T>] {
        &self.groups
    }

    pub fn virtualizer(&self) -> &Virtualizer {
        &self.virtualizer
    }

    pub fn set_items(&mut self, items: &[T], group_key: impl Fn(&T) -> String) {
        self.groups = group_items(items, group_key);
        *self.rows.borrow_mut() = flatten_groups(&self.groups);
        self.virtualizer.set_item_count(self.rows.borrow().len());
        self.virtualizer.reset_height_cache();
    }

    pub fn visible_rows(&self) -> Vec<(VirtualItem, FlatRow<T>)> {
        let rows = self.rows.borrow();
        self.virtualizer
            .visible_items()
            .into_iter()
            .filter_map(|item| rows.get(item.index).map(|row| (item, row.clone())))
            .collect()
    }
}
