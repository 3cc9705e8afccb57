use crate::config::{EditorPosition, PanelSettings, SettingsPanelConfig};
use crate::dom::html::{escape_attribute, escape_text};
use crate::element::{ElementHandle, ResolveOptions, Ui};
use crate::error::Result;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

struct SettingsPanelInner {
    settings: PanelSettings,
    config: SettingsPanelConfig,
    toggler: ElementHandle,
    panel: ElementHandle,
    position: Cell<EditorPosition>,
    visible: Cell<bool>,
    links: RefCell<Vec<ElementHandle>>,
    open_snippet: Rc<dyn Fn(usize, usize)>,
}

/// Demo and snippet picker behind the settings toggler. Hidden until the
/// toggler is clicked; the snippet list is rebuilt on every show.
#[derive(Clone)]
pub struct SettingsPanel {
    inner: Rc<SettingsPanelInner>,
}

impl fmt::Debug for SettingsPanel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SettingsPanel")
            .field("visible", &self.inner.visible.get())
            .field("position", &self.inner.position.get())
            .finish()
    }
}

impl SettingsPanel {
    pub fn mount(
        ui: &Ui,
        settings: PanelSettings,
        position: EditorPosition,
        config: SettingsPanelConfig,
        open_snippet: impl Fn(usize, usize) + 'static,
    ) -> Result<Self> {
        let options = ResolveOptions::default().relaxed_cleanup();
        let toggler = ui.resolve(&config.toggler_selector, options)?;
        let panel = ui.resolve(&config.panel_selector, options)?;
        panel.set_css("display", "none");

        let inner = Rc::new(SettingsPanelInner {
            settings,
            config,
            toggler,
            panel,
            position: Cell::new(position),
            visible: Cell::new(false),
            links: RefCell::new(Vec::new()),
            open_snippet: Rc::new(open_snippet),
        });
        let weak = Rc::downgrade(&inner);
        inner.toggler.on_click(move |_| {
            if let Some(inner) = weak.upgrade() {
                if let Err(error) = toggle(&inner) {
                    log::warn!("settings panel toggle failed: {error}");
                }
            }
        });
        Ok(Self { inner })
    }

    pub fn is_visible(&self) -> bool {
        self.inner.visible.get()
    }

    pub fn position(&self) -> EditorPosition {
        self.inner.position.get()
    }

    pub fn toggle(&self) -> Result<()> {
        toggle(&self.inner)
    }

    /// Moves the active marker; re-renders when shown.
    pub fn set_editor_position(&self, position: EditorPosition) -> Result<()> {
        self.inner.position.set(position);
        if self.inner.visible.get() {
            render(&self.inner)?;
        }
        Ok(())
    }

    pub fn panel(&self) -> &ElementHandle {
        &self.inner.panel
    }

    pub fn toggler(&self) -> &ElementHandle {
        &self.inner.toggler
    }

    /// Releases the toggler and snippet listeners. Both elements stay.
    pub fn destroy(&self) {
        for link in self.inner.links.take() {
            link.release_listeners();
        }
        self.inner.toggler.destroy();
        self.inner.panel.destroy();
    }
}

fn toggle(inner: &SettingsPanelInner) -> Result<()> {
    let visible = !inner.visible.get();
    inner.visible.set(visible);
    inner
        .panel
        .set_css("display", if visible { "block" } else { "none" });
    if visible {
        render(inner)?;
        inner.toggler.set_attr("src", &inner.config.close_icon);
    } else {
        inner.toggler.set_attr("src", &inner.config.open_icon);
    }
    Ok(())
}

fn render(inner: &SettingsPanelInner) -> Result<()> {
    let position = inner.position.get();
    let mut markup = String::new();
    let mut targets = Vec::new();
    for (demo, entry) in inner.settings.demos.iter().enumerate() {
        markup.push_str(r#"<div class="demo">"#);
        for (snippet, path) in entry.snippets.iter().enumerate() {
            let active = position == EditorPosition { demo, snippet };
            let class = if active { r#" class="active""# } else { "" };
            markup.push_str(&format!(
                r##"<a data-export="snippet"{class} data-demo="{demo}" data-snippet="{snippet}" href="{}">{}</a>"##,
                escape_attribute(&format!("#{demo},{snippet}")),
                escape_text(basename(path)),
            ));
            targets.push((demo, snippet));
        }
        markup.push_str("</div>");
    }

    let exports = inner.panel.set_content(&markup);
    log::debug!("rendered {} snippet link(s)", exports.len());
    let links: Vec<ElementHandle> = exports.all("snippet").cloned().collect();
    for (link, (demo, snippet)) in links.iter().zip(targets) {
        let open_snippet = inner.open_snippet.clone();
        link.on_click(move |event| {
            event.prevent_default();
            open_snippet(demo, snippet);
        });
    }
    *inner.links.borrow_mut() = links;
    Ok(())
}
