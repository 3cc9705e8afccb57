//! Status bar rendering, visibility and rebinding against an in-memory state

use boon_playground_ui::config::StatusBarConfig;
use boon_playground_ui::state::{EditorSettings, FileEntry, Profile, StateSnapshot, Subscription};
use boon_playground_ui::{MemoryState, PlaygroundState, StatusBar, StatusBarActions, Ui};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

const PAGE: &str = r#"<div class="app"><div class="layout"></div><div class="status-bar"></div></div>"#;

fn two_files() -> StateSnapshot {
    StateSnapshot {
        files: vec![FileEntry::entry("main.js"), FileEntry::new("util.js")],
        name: Some("counter".to_owned()),
        ..StateSnapshot::default()
    }
}

struct Harness {
    ui: Ui,
    state: MemoryState,
    bar: StatusBar,
    log: Rc<RefCell<Vec<String>>>,
}

fn mount_with(snapshot: StateSnapshot, config: StatusBarConfig) -> Harness {
    let ui = Ui::from_html(PAGE);
    let state = MemoryState::new(snapshot);
    let log = Rc::new(RefCell::new(Vec::new()));
    let record = |label: &'static str| {
        let log = log.clone();
        move || log.borrow_mut().push(label.to_owned())
    };
    let actions = StatusBarActions::default()
        .on_show_file({
            let log = log.clone();
            move |index| log.borrow_mut().push(format!("show {index}"))
        })
        .on_edit_file({
            let log = log.clone();
            move |index| log.borrow_mut().push(format!("edit {index}"))
        })
        .on_new_file(record("new"))
        .on_show_settings(record("settings"))
        .on_show_profile(record("profile"))
        .on_edit_name(record("name"));
    let bar = StatusBar::mount(&ui, Rc::new(state.clone()), actions, config).unwrap();
    Harness { ui, state, bar, log }
}

fn mount(snapshot: StateSnapshot) -> Harness {
    mount_with(snapshot, StatusBarConfig::default())
}

fn file_columns(columns: &str) -> usize {
    columns.matches("minmax(auto, 135px)").count()
}

#[test]
fn starts_collapsed_and_expands_on_bar_click() {
    let harness = mount(two_files());
    let exports = harness.bar.exports().unwrap();

    // Collapsed
    assert!(!harness.bar.is_expanded());
    assert_eq!(harness.bar.bar().css("height").as_deref(), Some("6px"));
    assert_eq!(exports.buttons.css("display").as_deref(), Some("none"));
    let layout = harness.ui.el(".app .layout").unwrap();
    assert_eq!(layout.css("height").as_deref(), Some("calc(100% - 6px)"));

    harness.bar.bar().click();

    // Expanded
    assert!(harness.bar.is_expanded());
    assert_eq!(harness.bar.bar().css("height").as_deref(), Some("36px"));
    assert_eq!(exports.buttons.css("display").as_deref(), Some("grid"));
    assert_eq!(layout.css("height").as_deref(), Some("calc(100% - 36px)"));
    let columns = exports.buttons.css("grid-template-columns").unwrap();
    assert_eq!(file_columns(&columns), 3);
    assert!(columns.ends_with("30px 1fr 30px 30px"));
    assert!(harness.state.status_bar_visible());
}

#[test]
fn close_collapses_without_reaching_the_bar() {
    let harness = mount(two_files());
    harness.bar.bar().click();
    let close = harness.bar.exports().unwrap().close;

    let outcome = close.click();

    assert!(outcome.propagation_stopped);
    assert!(!harness.bar.is_expanded());
    assert_eq!(harness.bar.bar().css("height").as_deref(), Some("6px"));
    assert!(!harness.state.status_bar_visible());
}

#[test]
fn persisted_visibility_is_the_initial_state() {
    let snapshot = StateSnapshot {
        editor_settings: EditorSettings { status_bar: true },
        ..two_files()
    };
    let harness = mount(snapshot);

    assert!(harness.bar.is_expanded());
    assert_eq!(harness.bar.bar().css("height").as_deref(), Some("36px"));
}

#[test]
fn file_clicks_show_and_right_clicks_edit() {
    let harness = mount(two_files());
    let files = harness.bar.exports().unwrap().files;
    assert_eq!(files.len(), 2);

    files[1].right_click();
    files[0].click();
    let outcome = files[1].right_click();

    assert!(outcome.default_prevented);
    assert_eq!(*harness.log.borrow(), vec!["edit 1", "show 0", "edit 1"]);
}

#[test]
fn buttons_forward_to_actions() {
    let harness = mount(two_files());
    let exports = harness.bar.exports().unwrap();

    exports.new_file.click();
    exports.settings.click();
    exports.name.click();

    assert_eq!(*harness.log.borrow(), vec!["new", "settings", "name"]);
    assert_eq!(exports.name.text(), "counter");
}

#[test]
fn state_changes_rerender_and_rebind() {
    let harness = mount(two_files());
    let old_files = harness.bar.exports().unwrap().files;
    assert_eq!(harness.bar.render_count(), 1);

    harness.state.update(|snapshot| {
        snapshot.files.push(FileEntry::new("style.css"));
        snapshot.current_index = 2;
        snapshot.pending_changes = true;
    });

    let exports = harness.bar.exports().unwrap();
    assert_eq!(harness.bar.render_count(), 2);
    assert_eq!(exports.files.len(), 3);
    assert!(!old_files[0].is_alive());
    assert_eq!(exports.files[2].text(), "style.css*");
    assert_eq!(exports.files[2].attr("class").as_deref(), Some("file active"));
    assert_eq!(exports.files[0].attr("class").as_deref(), Some("file entry"));

    // Old handles are dead, new ones carry exactly one binding each
    old_files[1].click();
    exports.files[1].click();
    assert_eq!(*harness.log.borrow(), vec!["show 1"]);

    harness.bar.bar().click();
    let columns = exports.buttons.css("grid-template-columns").unwrap();
    assert_eq!(file_columns(&columns), 4);
}

#[test]
fn rerender_keeps_expanded_state() {
    let harness = mount(two_files());
    harness.bar.bar().click();

    harness.state.update(|snapshot| snapshot.name = None);

    let exports = harness.bar.exports().unwrap();
    assert!(harness.bar.is_expanded());
    assert_eq!(exports.buttons.css("display").as_deref(), Some("grid"));
    assert_eq!(exports.name.text(), "unnamed");
}

#[test]
fn state_text_is_escaped() {
    let snapshot = StateSnapshot {
        files: vec![FileEntry::new("<script>.js")],
        name: Some("a & b".to_owned()),
        ..StateSnapshot::default()
    };
    let harness = mount(snapshot);
    let exports = harness.bar.exports().unwrap();

    assert_eq!(exports.files[0].text(), "<script>.js");
    assert_eq!(exports.name.text(), "a & b");
    assert!(harness.bar.bar().content().contains("&lt;script&gt;.js"));
}

#[test]
fn fork_button_only_when_forkable() {
    let harness = mount(two_files());
    assert!(harness.bar.exports().unwrap().fork.is_none());

    let snapshot = StateSnapshot {
        forkable: true,
        ..two_files()
    };
    let harness = mount(snapshot);
    let fork = harness.bar.exports().unwrap().fork.unwrap();
    harness.bar.expand();
    let columns = harness.bar.exports().unwrap().buttons.css("grid-template-columns").unwrap();
    assert!(columns.starts_with("30px minmax"));

    fork.click();

    assert_eq!(harness.state.fork_count(), 1);
    // Forking notifies, so the bar rendered again
    assert_eq!(harness.bar.render_count(), 2);
}

#[test]
fn production_shows_profile() {
    let production = StatusBarConfig {
        production: true,
        ..StatusBarConfig::default()
    };

    let anonymous = mount_with(two_files(), production.clone());
    let profile = anonymous.bar.exports().unwrap().profile.unwrap();
    assert!(profile.content().contains("no-user"));

    let snapshot = StateSnapshot {
        profile: Some(Profile {
            name: "martin".to_owned(),
            avatar: "https://example.com/a.png".to_owned(),
        }),
        ..two_files()
    };
    let signed_in = mount_with(snapshot, production);
    let profile = signed_in.bar.exports().unwrap().profile.unwrap();
    assert_eq!(profile.content(), r#"<img src="https://example.com/a.png">"#);
    profile.click();
    assert_eq!(*signed_in.log.borrow(), vec!["profile"]);

    signed_in.bar.expand();
    let columns = signed_in.bar.exports().unwrap().buttons.css("grid-template-columns").unwrap();
    assert!(columns.starts_with("34px minmax"));

    let development = mount(two_files());
    assert!(development.bar.exports().unwrap().profile.is_none());
}

#[test]
fn destroy_unsubscribes_and_leaves_the_bar() {
    let harness = mount(two_files());
    let bar = harness.bar.bar().clone();
    let file = harness.bar.exports().unwrap().files[0].clone();
    assert_eq!(harness.state.listener_count(), 1);

    harness.bar.destroy();

    assert_eq!(harness.state.listener_count(), 0);
    assert!(harness.ui.exists(".status-bar").unwrap());
    assert!(bar.is_connected());
    file.click();
    bar.click();
    assert!(harness.log.borrow().is_empty());
    assert_eq!(bar.css("height").as_deref(), Some("6px"));
}

/// Notifies from inside the widget's own callbacks.
struct NoisyState {
    inner: MemoryState,
    notify_on_files: Cell<bool>,
    notify_on_forkable: Cell<bool>,
    visibility_reports: Cell<usize>,
}

impl NoisyState {
    fn new(snapshot: StateSnapshot) -> Rc<Self> {
        Rc::new(Self {
            inner: MemoryState::new(snapshot),
            notify_on_files: Cell::new(false),
            notify_on_forkable: Cell::new(false),
            visibility_reports: Cell::new(0),
        })
    }
}

impl PlaygroundState for NoisyState {
    fn listen(&self, callback: Rc<dyn Fn()>) -> Subscription {
        self.inner.listen(callback)
    }

    fn files(&self) -> Vec<FileEntry> {
        if self.notify_on_files.replace(false) {
            self.inner.notify();
        }
        self.inner.files()
    }

    fn is_current_index(&self, index: usize) -> bool {
        self.inner.is_current_index(index)
    }

    fn pending_changes(&self) -> bool {
        self.inner.pending_changes()
    }

    fn logged_in(&self) -> bool {
        self.inner.logged_in()
    }

    fn profile(&self) -> Option<Profile> {
        self.inner.profile()
    }

    fn is_forkable(&self) -> bool {
        if self.notify_on_forkable.replace(false) {
            self.inner.notify();
        }
        self.inner.is_forkable()
    }

    fn name(&self) -> Option<String> {
        self.inner.name()
    }

    fn editor_settings(&self) -> EditorSettings {
        self.inner.editor_settings()
    }

    fn update_status_bar_visibility(&self, visible: bool) {
        self.visibility_reports.set(self.visibility_reports.get() + 1);
        self.inner.update_status_bar_visibility(visible);
        // A store that broadcasts every write
        self.inner.notify();
    }

    fn fork(&self) {
        self.inner.fork();
    }
}

#[test]
fn nested_notifications_coalesce() {
    let ui = Ui::from_html(PAGE);
    let state = NoisyState::new(two_files());
    let bar = StatusBar::mount(&ui, state.clone(), StatusBarActions::default(), StatusBarConfig::default()).unwrap();

    // Visibility reports do not feed back into renders
    bar.bar().click();
    assert_eq!(bar.render_count(), 1);
    assert_eq!(state.visibility_reports.get(), 2);

    // A notification during a render schedules exactly one more
    state.notify_on_files.set(true);
    state.inner.notify();
    assert_eq!(bar.render_count(), 3);
    assert!(bar.is_expanded());
}

#[test]
fn notification_while_expanding_rerenders_once() {
    let ui = Ui::from_html(PAGE);
    let state = NoisyState::new(two_files());
    let bar = StatusBar::mount(&ui, state.clone(), StatusBarActions::default(), StatusBarConfig::default()).unwrap();

    state.notify_on_forkable.set(true);
    bar.expand();

    assert_eq!(bar.render_count(), 2);
    assert!(bar.is_expanded());
    let buttons = bar.exports().unwrap().buttons;
    assert!(buttons.is_connected());
    assert_eq!(buttons.css("display").as_deref(), Some("grid"));
}

#[test]
fn registry_stays_flat_across_renders() {
    let harness = mount(two_files());
    let registered = harness.ui.registry().len();

    for round in 0..200 {
        harness.state.update(|snapshot| snapshot.name = Some(format!("draft {round}")));
    }

    assert_eq!(harness.bar.render_count(), 201);
    assert_eq!(harness.ui.registry().len(), registered);
}
