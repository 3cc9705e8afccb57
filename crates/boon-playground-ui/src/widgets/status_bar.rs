use crate::config::StatusBarConfig;
use crate::dom::html::{escape_attribute, escape_text};
use crate::element::{ElementHandle, ExportSet, Exports, Ui};
use crate::error::Result;
use crate::state::{PlaygroundState, Subscription};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

const FILE_COLUMN: &str = "minmax(auto, 135px)";

/// Callbacks the bar forwards user intent to.
#[derive(Clone)]
pub struct StatusBarActions {
    pub show_file: Rc<dyn Fn(usize)>,
    pub edit_file: Rc<dyn Fn(usize)>,
    pub new_file: Rc<dyn Fn()>,
    pub show_settings: Rc<dyn Fn()>,
    pub show_profile: Rc<dyn Fn()>,
    pub edit_name: Rc<dyn Fn()>,
}

impl Default for StatusBarActions {
    fn default() -> Self {
        Self {
            show_file: Rc::new(|_| {}),
            edit_file: Rc::new(|_| {}),
            new_file: Rc::new(|| {}),
            show_settings: Rc::new(|| {}),
            show_profile: Rc::new(|| {}),
            edit_name: Rc::new(|| {}),
        }
    }
}

impl fmt::Debug for StatusBarActions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StatusBarActions").finish_non_exhaustive()
    }
}

impl StatusBarActions {
    pub fn on_show_file(mut self, callback: impl Fn(usize) + 'static) -> Self {
        self.show_file = Rc::new(callback);
        self
    }

    pub fn on_edit_file(mut self, callback: impl Fn(usize) + 'static) -> Self {
        self.edit_file = Rc::new(callback);
        self
    }

    pub fn on_new_file(mut self, callback: impl Fn() + 'static) -> Self {
        self.new_file = Rc::new(callback);
        self
    }

    pub fn on_show_settings(mut self, callback: impl Fn() + 'static) -> Self {
        self.show_settings = Rc::new(callback);
        self
    }

    pub fn on_show_profile(mut self, callback: impl Fn() + 'static) -> Self {
        self.show_profile = Rc::new(callback);
        self
    }

    pub fn on_edit_name(mut self, callback: impl Fn() + 'static) -> Self {
        self.edit_name = Rc::new(callback);
        self
    }
}

/// Exports of one status bar render.
#[derive(Debug, Clone)]
pub struct StatusBarExports {
    pub buttons: ElementHandle,
    /// One per file, in file order.
    pub files: Vec<ElementHandle>,
    pub new_file: ElementHandle,
    pub name: ElementHandle,
    pub settings: ElementHandle,
    pub close: ElementHandle,
    /// Production builds only.
    pub profile: Option<ElementHandle>,
    /// Forkable playgrounds only.
    pub fork: Option<ElementHandle>,
}

impl ExportSet for StatusBarExports {
    fn from_exports(exports: &Exports) -> Result<Self> {
        let named = exports.named();
        Ok(Self {
            buttons: named.require("buttons")?,
            files: exports.all("file").cloned().collect(),
            new_file: named.require("new-file")?,
            name: named.require("name")?,
            settings: named.require("settings")?,
            close: named.require("close")?,
            profile: named.optional("profile"),
            fork: named.optional("fork"),
        })
    }
}

/// `grid-template-columns` of the button row.
pub fn grid_columns(production: bool, forkable: bool, files: usize) -> String {
    let mut columns = Vec::with_capacity(files + 7);
    if production {
        columns.push("34px");
    }
    if forkable {
        columns.push("30px");
    }
    columns.extend(std::iter::repeat_n(FILE_COLUMN, files + 1));
    columns.extend(["30px", "1fr", "30px", "30px"]);
    columns.join(" ")
}

fn link(export: &str, class: &str, label: &str) -> String {
    format!(
        r#"<a data-export="{export}" class="{}" href="javascript:void(0)">{label}</a>"#,
        escape_attribute(class)
    )
}

fn icon(name: &str) -> String {
    format!(r#"<span class="icon icon-{name}"></span>"#)
}

fn markup(state: &dyn PlaygroundState, production: bool) -> String {
    let mut out = String::from(r#"<div data-export="buttons">"#);
    if production {
        let label = match state.profile().filter(|_| state.logged_in()) {
            Some(profile) => format!(r#"<img src="{}">"#, escape_attribute(&profile.avatar)),
            None => icon("no-user"),
        };
        out.push_str(&link("profile", "profile", &label));
    }
    if state.is_forkable() {
        out.push_str(&link("fork", "", &icon("fork")));
    }
    let pending = state.pending_changes();
    for (index, file) in state.files().iter().enumerate() {
        let current = state.is_current_index(index);
        let mut class = String::from("file");
        if current {
            class.push_str(" active");
        }
        if file.entry_point {
            class.push_str(" entry");
        }
        let marker = if current && pending { "*" } else { "" };
        let label = format!("<span>{}{marker}</span>", escape_text(&file.filename));
        out.push_str(&link("file", &class, &label));
    }
    out.push_str(&link("new-file", "", &icon("plus")));
    let name = state.name().filter(|name| !name.is_empty());
    let name = escape_text(name.as_deref().unwrap_or("unnamed"));
    out.push_str(&link("name", "name", &name));
    out.push_str(&link("settings", "", &icon("settings")));
    out.push_str(&link("close", "", &icon("close")));
    out.push_str("</div>");
    out
}

struct StatusBarInner {
    state: Rc<dyn PlaygroundState>,
    actions: StatusBarActions,
    config: StatusBarConfig,
    bar: ElementHandle,
    layout: ElementHandle,
    visible: Cell<bool>,
    exports: RefCell<Option<StatusBarExports>>,
    file_count: Cell<usize>,
    rendering: Cell<bool>,
    render_requested: Cell<bool>,
    reporting: Cell<bool>,
    renders: Cell<usize>,
}

/// The collapsible bar under the editor listing the playground's files.
///
/// Re-renders on every state notification. Dropping it unsubscribes; the
/// listeners it left in the document become no-ops.
pub struct StatusBar {
    inner: Rc<StatusBarInner>,
    subscription: Option<Subscription>,
}

impl fmt::Debug for StatusBar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StatusBar")
            .field("expanded", &self.inner.visible.get())
            .field("renders", &self.inner.renders.get())
            .finish()
    }
}

impl StatusBar {
    pub fn mount(
        ui: &Ui,
        state: Rc<dyn PlaygroundState>,
        actions: StatusBarActions,
        config: StatusBarConfig,
    ) -> Result<Self> {
        let bar = ui.with_relaxed_cleanup(&config.status_bar_selector)?;
        let layout = ui.with_relaxed_cleanup(&config.layout_selector)?;
        let visible = state.editor_settings().status_bar;
        let inner = Rc::new(StatusBarInner {
            state,
            actions,
            config,
            bar,
            layout,
            visible: Cell::new(visible),
            exports: RefCell::new(None),
            file_count: Cell::new(0),
            rendering: Cell::new(false),
            render_requested: Cell::new(false),
            reporting: Cell::new(false),
            renders: Cell::new(0),
        });
        request_render(&inner)?;

        let weak = Rc::downgrade(&inner);
        let subscription = inner.state.listen(Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Err(error) = request_render(&inner) {
                    log::warn!("status bar render failed: {error}");
                }
            }
        }));
        Ok(Self {
            inner,
            subscription: Some(subscription),
        })
    }

    pub fn is_expanded(&self) -> bool {
        self.inner.visible.get()
    }

    pub fn bar(&self) -> &ElementHandle {
        &self.inner.bar
    }

    pub fn layout(&self) -> &ElementHandle {
        &self.inner.layout
    }

    /// Exports of the latest render.
    pub fn exports(&self) -> Option<StatusBarExports> {
        self.inner.exports.borrow().clone()
    }

    pub fn render_count(&self) -> usize {
        self.inner.renders.get()
    }

    pub fn expand(&self) {
        set_visible(&self.inner, true);
    }

    pub fn collapse(&self) {
        set_visible(&self.inner, false);
    }

    /// Unsubscribes and releases every listener. The bar and layout elements
    /// stay in the document.
    pub fn destroy(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        if let Some(exports) = self.inner.exports.borrow_mut().take() {
            release_exports(&exports);
        }
        self.inner.bar.destroy();
        self.inner.layout.destroy();
    }
}

fn release_exports(exports: &StatusBarExports) {
    let fixed = [&exports.buttons, &exports.new_file, &exports.name, &exports.settings, &exports.close];
    let optional = exports.profile.iter().chain(exports.fork.iter());
    for handle in exports.files.iter().chain(fixed).chain(optional) {
        handle.release_listeners();
    }
}

/// Renders now, or marks a follow-up when a render is already running.
fn request_render(inner: &Rc<StatusBarInner>) -> Result<()> {
    if inner.reporting.get() {
        return Ok(());
    }
    if inner.rendering.get() {
        log::debug!("status bar render requested mid-render, coalescing");
        inner.render_requested.set(true);
        return Ok(());
    }
    inner.rendering.set(true);
    let result = loop {
        inner.render_requested.set(false);
        if let Err(error) = render(inner) {
            break Err(error);
        }
        if !inner.render_requested.get() {
            break Ok(());
        }
    };
    inner.rendering.set(false);
    result
}

fn render(inner: &Rc<StatusBarInner>) -> Result<()> {
    let markup = markup(&*inner.state, inner.config.production);
    let exports: StatusBarExports = inner.bar.render(&markup)?;
    inner.renders.set(inner.renders.get() + 1);
    log::debug!("rendered status bar with {} file(s)", exports.files.len());

    for (index, file) in exports.files.iter().enumerate() {
        let show_file = inner.actions.show_file.clone();
        file.on_click(move |_| show_file(index));
        let edit_file = inner.actions.edit_file.clone();
        file.on_right_click(move || edit_file(index));
    }
    let bindings = [
        (Some(&exports.new_file), &inner.actions.new_file),
        (Some(&exports.settings), &inner.actions.show_settings),
        (exports.profile.as_ref(), &inner.actions.show_profile),
        (Some(&exports.name), &inner.actions.edit_name),
    ];
    for (handle, action) in bindings {
        if let Some(handle) = handle {
            let action = action.clone();
            handle.on_click(move |_| action());
        }
    }
    if let Some(fork) = &exports.fork {
        let state = Rc::downgrade(&inner.state);
        fork.on_click(move |_| {
            if let Some(state) = state.upgrade() {
                state.fork();
            }
        });
    }

    let weak: Weak<StatusBarInner> = Rc::downgrade(inner);
    exports.close.on_click(move |event| {
        event.stop_propagation();
        if let Some(inner) = weak.upgrade() {
            set_visible(&inner, false);
        }
    });
    let weak = Rc::downgrade(inner);
    inner.bar.on_click(move |_| {
        if let Some(inner) = weak.upgrade() {
            if !inner.visible.get() {
                set_visible(&inner, true);
            }
        }
    });

    inner.file_count.set(exports.files.len());
    *inner.exports.borrow_mut() = Some(exports);
    apply_visibility(inner);
    Ok(())
}

fn set_visible(inner: &StatusBarInner, visible: bool) {
    inner.visible.set(visible);
    apply_visibility(inner);
}

fn apply_visibility(inner: &StatusBarInner) {
    let visible = inner.visible.get();
    // State getters may notify and re-render, so no exports borrow across them
    let forkable = inner.state.is_forkable();
    if let Some(exports) = inner.exports.borrow().as_ref() {
        let columns = grid_columns(inner.config.production, forkable, inner.file_count.get());
        exports
            .buttons
            .set_css("display", if visible { "grid" } else { "none" })
            .set_css("grid-template-columns", &columns);
    }
    let height = if visible {
        &inner.config.visible_height
    } else {
        &inner.config.hidden_height
    };
    inner.bar.set_css("height", height);
    inner.layout.set_css("height", &format!("calc(100% - {height})"));

    inner.reporting.set(true);
    inner.state.update_status_bar_visibility(visible);
    inner.reporting.set(false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_has_one_spare_file_column() {
        assert_eq!(
            grid_columns(false, false, 2),
            "minmax(auto, 135px) minmax(auto, 135px) minmax(auto, 135px) 30px 1fr 30px 30px"
        );
    }

    #[test]
    fn grid_leads_with_profile_and_fork_columns() {
        let columns = grid_columns(true, true, 0);
        assert!(columns.starts_with("34px 30px minmax(auto, 135px) 30px"));
        assert_eq!(columns.split(' ').filter(|column| *column == "1fr").count(), 1);
    }
}
