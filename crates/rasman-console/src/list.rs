//! Generic list/CRUD component.
//!
//! A [`CrudList`] holds one entity collection and its load state
//! (`Loading -> Populated | Empty | Error`) and is configured entirely by a
//! [`ListConfig`]: field selectors, a create affordance, per-row action
//! buttons and header controls.  [`CrudList::view`] snapshots it into a
//! [`ListView`] whose rows carry their own bound actions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use tokio::sync::Notify;
use tracing::{debug, warn};

pub type Handler = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;
pub type ItemHandler<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

/// Colour role, resolved to an actual colour by whatever renders the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tint {
    Neutral,
    Primary,
    Secondary,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Populated,
    Empty,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerStyle {
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub text: String,
    pub style: BannerStyle,
}

impl Banner {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: BannerStyle::Success,
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: BannerStyle::Warning,
        }
    }

    pub fn danger(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: BannerStyle::Danger,
        }
    }

    /// Success or danger depending on how an operation went.
    pub fn outcome(ok: bool, success: impl Into<String>, failure: impl Into<String>) -> Self {
        if ok {
            Self::success(success)
        } else {
            Self::danger(failure)
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub struct ActionButton<T> {
    /// Stable identifier, used to pick the action from the command line.
    pub id: &'static str,
    pub icon: &'static str,
    pub tint: Tint,
    pub tooltip: String,
    pub enabled: fn(&T) -> bool,
    pub handler: ItemHandler<T>,
}

pub struct CreateAffordance {
    pub label: String,
    pub description: String,
    pub icon: &'static str,
    pub handler: Handler,
}

pub struct HeaderControl {
    pub id: &'static str,
    pub label: String,
    pub handler: Handler,
}

pub struct ListConfig<T> {
    pub title: String,
    pub error_message: String,
    pub key: fn(&T) -> String,
    pub label: fn(&T) -> String,
    pub description: fn(&T) -> String,
    pub icon: &'static str,
    pub icon_tint: Option<fn(&T) -> Tint>,
    pub default_tint: Tint,
    pub create: Option<CreateAffordance>,
    pub refresh: Option<Handler>,
    pub actions: Vec<ActionButton<T>>,
    pub on_press: Option<ItemHandler<T>>,
    pub header_controls: Vec<HeaderControl>,
}

impl<T> ListConfig<T> {
    pub fn new(title: impl Into<String>, key: fn(&T) -> String, label: fn(&T) -> String) -> Self {
        let title = title.into();
        Self {
            error_message: format!("Failed to load {}. Check API connection.", title.to_lowercase()),
            title,
            key,
            label,
            description: |_| String::new(),
            icon: "material/list",
            icon_tint: None,
            default_tint: Tint::Primary,
            create: None,
            refresh: None,
            actions: Vec::new(),
            on_press: None,
            header_controls: Vec::new(),
        }
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    pub fn description(mut self, description: fn(&T) -> String) -> Self {
        self.description = description;
        self
    }

    pub fn icon(mut self, icon: &'static str, default_tint: Tint) -> Self {
        self.icon = icon;
        self.default_tint = default_tint;
        self
    }

    pub fn icon_tint(mut self, icon_tint: fn(&T) -> Tint) -> Self {
        self.icon_tint = Some(icon_tint);
        self
    }

    pub fn create(mut self, create: CreateAffordance) -> Self {
        self.create = Some(create);
        self
    }

    pub fn refresh(mut self, refresh: Handler) -> Self {
        self.refresh = Some(refresh);
        self
    }

    pub fn action(mut self, action: ActionButton<T>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn on_press(mut self, handler: ItemHandler<T>) -> Self {
        self.on_press = Some(handler);
        self
    }

    pub fn header_control(mut self, control: HeaderControl) -> Self {
        self.header_controls.push(control);
        self
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

struct ListState<T> {
    title: String,
    items: Vec<T>,
    phase: Phase,
    banner: Option<Banner>,
}

pub struct CrudList<T> {
    config: Arc<ListConfig<T>>,
    state: Arc<Mutex<ListState<T>>>,
    busy: Arc<AtomicBool>,
    changed: Arc<Notify>,
}

impl<T> Clone for CrudList<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            state: self.state.clone(),
            busy: self.busy.clone(),
            changed: self.changed.clone(),
        }
    }
}

/// Held for the duration of a create or refresh; clears the busy flag on
/// drop, including when the handler panics.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: Clone + Send + 'static> CrudList<T> {
    pub fn new(config: ListConfig<T>) -> Self {
        let state = ListState {
            title: config.title.clone(),
            items: Vec::new(),
            phase: Phase::Loading,
            banner: None,
        };
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(state)),
            busy: Arc::new(AtomicBool::new(false)),
            changed: Arc::new(Notify::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ListState<T>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn touch(&self) {
        self.changed.notify_waiters();
    }

    // -----------------------------------------------------------------------
    // Load state
    // -----------------------------------------------------------------------

    /// Back to `Loading`, before a fetch is issued.
    pub fn begin_loading(&self) {
        self.lock().phase = Phase::Loading;
        self.touch();
    }

    /// Apply a fetch result.  `None` means the fetch failed; an empty
    /// collection is a successful, empty load.
    pub fn apply(&self, result: Option<Vec<T>>) {
        {
            let mut state = self.lock();
            match result {
                Some(items) => {
                    state.phase = if items.is_empty() {
                        Phase::Empty
                    } else {
                        Phase::Populated
                    };
                    state.items = items;
                    if matches!(&state.banner, Some(b) if b.style == BannerStyle::Danger) {
                        state.banner = None;
                    }
                }
                None => {
                    state.phase = Phase::Error;
                    state.items.clear();
                    state.banner = Some(Banner::danger(self.config.error_message.clone()));
                }
            }
        }
        self.touch();
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.lock().items.iter().find(|item| predicate(item)).cloned()
    }

    pub fn key_of(&self, item: &T) -> String {
        (self.config.key)(item)
    }

    /// Drop the record whose key is `key`.  Returns how many were removed.
    pub fn remove_by_key(&self, key: &str) -> usize {
        let removed = {
            let mut state = self.lock();
            let before = state.items.len();
            let key_fn = self.config.key;
            state.items.retain(|item| key_fn(item) != key);
            if state.phase == Phase::Populated && state.items.is_empty() {
                state.phase = Phase::Empty;
            }
            before - state.items.len()
        };
        self.touch();
        removed
    }

    /// Replace the record with the same key as `item`.  Returns whether one
    /// was found.
    pub fn replace(&self, item: T) -> bool {
        let replaced = {
            let mut state = self.lock();
            let key_fn = self.config.key;
            let key = key_fn(&item);
            match state.items.iter_mut().find(|existing| key_fn(existing) == key) {
                Some(slot) => {
                    *slot = item;
                    true
                }
                None => false,
            }
        };
        self.touch();
        replaced
    }

    // -----------------------------------------------------------------------
    // Banner and title
    // -----------------------------------------------------------------------

    pub fn banner(&self) -> Option<Banner> {
        self.lock().banner.clone()
    }

    pub fn set_banner(&self, banner: Banner) {
        self.lock().banner = Some(banner);
        self.touch();
    }

    pub fn clear_banner(&self) {
        self.lock().banner = None;
    }

    pub fn title(&self) -> String {
        self.lock().title.clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.lock().title = title.into();
    }

    pub fn singular_title(&self) -> String {
        singularize(&self.title())
    }

    /// Resolves after the next change to items, phase or banner.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    // -----------------------------------------------------------------------
    // Triggers
    // -----------------------------------------------------------------------

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run the create handler.  `false` when there is none or another
    /// create/refresh on this list is still running.
    pub async fn trigger_create(&self) -> bool {
        let Some(create) = &self.config.create else {
            return false;
        };
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            warn!(list = %self.title(), "Create ignored, list is busy");
            return false;
        };
        (create.handler)().await;
        true
    }

    /// Run the refresh handler, same exclusion as [`Self::trigger_create`].
    pub async fn trigger_refresh(&self) -> bool {
        let Some(refresh) = &self.config.refresh else {
            return false;
        };
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            warn!(list = %self.title(), "Refresh ignored, list is busy");
            return false;
        };
        (refresh)().await;
        true
    }

    // -----------------------------------------------------------------------
    // View
    // -----------------------------------------------------------------------

    pub fn view(&self) -> ListView<T> {
        let state = self.lock();
        let config = &self.config;

        let body = match state.phase {
            Phase::Loading => ListBody::Loading,
            Phase::Error => ListBody::Error {
                message: config.error_message.clone(),
            },
            Phase::Empty => ListBody::Empty {
                message: format!("No {} found", state.title.to_lowercase()),
                create_label: config
                    .create
                    .as_ref()
                    .map(|_| format!("Create New {}", singularize(&state.title))),
            },
            Phase::Populated => {
                ListBody::Populated(state.items.iter().map(|item| self.bind_row(item)).collect())
            }
        };

        ListView {
            title: state.title.clone(),
            icon: config.icon,
            banner: state.banner.clone(),
            create: config.create.as_ref().map(|c| CreateButton {
                label: c.label.clone(),
                description: c.description.clone(),
                icon: c.icon,
            }),
            header: config
                .header_controls
                .iter()
                .map(|h| HeaderButton {
                    id: h.id,
                    label: h.label.clone(),
                    handler: h.handler.clone(),
                })
                .collect(),
            busy: self.is_busy(),
            body,
        }
    }

    /// Bind every action to its own clone of `item`, so pressing a row's
    /// button acts on that row whatever happens to the list afterwards.
    fn bind_row(&self, item: &T) -> Row<T> {
        let config = &self.config;
        Row {
            key: (config.key)(item),
            label: (config.label)(item),
            description: (config.description)(item),
            icon: config.icon,
            tint: config.icon_tint.map_or(config.default_tint, |f| f(item)),
            actions: config
                .actions
                .iter()
                .map(|action| BoundAction {
                    id: action.id,
                    icon: action.icon,
                    tint: action.tint,
                    tooltip: action.tooltip.clone(),
                    enabled: (action.enabled)(item),
                    item: item.clone(),
                    handler: action.handler.clone(),
                })
                .collect(),
            press: config.on_press.as_ref().map(|handler| BoundPress {
                item: item.clone(),
                handler: handler.clone(),
            }),
            item: item.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// View types
// ---------------------------------------------------------------------------

pub struct ListView<T> {
    pub title: String,
    pub icon: &'static str,
    pub banner: Option<Banner>,
    pub create: Option<CreateButton>,
    pub header: Vec<HeaderButton>,
    pub busy: bool,
    pub body: ListBody<T>,
}

impl<T> ListView<T> {
    pub fn rows(&self) -> &[Row<T>] {
        match &self.body {
            ListBody::Populated(rows) => rows,
            _ => &[],
        }
    }
}

pub enum ListBody<T> {
    Loading,
    Error {
        message: String,
    },
    Empty {
        message: String,
        create_label: Option<String>,
    },
    Populated(Vec<Row<T>>),
}

pub struct CreateButton {
    pub label: String,
    pub description: String,
    pub icon: &'static str,
}

pub struct HeaderButton {
    pub id: &'static str,
    pub label: String,
    handler: Handler,
}

impl HeaderButton {
    pub async fn press(&self) {
        (self.handler)().await;
    }
}

pub struct Row<T> {
    pub key: String,
    pub label: String,
    pub description: String,
    pub icon: &'static str,
    pub tint: Tint,
    pub item: T,
    pub actions: Vec<BoundAction<T>>,
    press: Option<BoundPress<T>>,
}

impl<T: Clone> Row<T> {
    pub fn action(&self, id: &str) -> Option<&BoundAction<T>> {
        self.actions.iter().find(|a| a.id == id)
    }

    /// Run the item-press handler.  `false` when the list has none.
    pub async fn press(&self) -> bool {
        match &self.press {
            Some(press) => {
                (press.handler)(press.item.clone()).await;
                true
            }
            None => false,
        }
    }
}

struct BoundPress<T> {
    item: T,
    handler: ItemHandler<T>,
}

pub struct BoundAction<T> {
    pub id: &'static str,
    pub icon: &'static str,
    pub tint: Tint,
    pub tooltip: String,
    pub enabled: bool,
    item: T,
    handler: ItemHandler<T>,
}

impl<T: Clone> BoundAction<T> {
    /// Run the handler on the bound item.  Disabled actions do nothing and
    /// return `false`.
    pub async fn press(&self) -> bool {
        if !self.enabled {
            debug!(action = self.id, "Ignoring press on disabled action");
            return false;
        }
        (self.handler)(self.item.clone()).await;
        true
    }
}

// ---------------------------------------------------------------------------
// Singular titles
// ---------------------------------------------------------------------------

const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("categories", "category"),
    ("properties", "property"),
    ("activities", "activity"),
    ("histories", "history"),
    ("entries", "entry"),
    ("countries", "country"),
    ("policies", "policy"),
];

/// Singular form of a plural title, for empty-state text.  Only the last
/// word changes and it keeps the case of its first letter.
pub fn singularize(title: &str) -> String {
    let title = title.trim_end();
    let (head, last) = match title.rsplit_once(' ') {
        Some((head, last)) => (Some(head), last),
        None => (None, title),
    };

    let lowered = last.to_lowercase();
    let singular = match IRREGULAR_PLURALS.iter().find(|(plural, _)| *plural == lowered) {
        Some((_, singular)) => match_first_letter_case(last, singular),
        None => last
            .strip_suffix(['s', 'S'])
            .unwrap_or(last)
            .to_string(),
    };

    match head {
        Some(head) => format!("{head} {singular}"),
        None => singular,
    }
}

fn match_first_letter_case(model: &str, word: &str) -> String {
    let upper = model.chars().next().is_some_and(char::is_uppercase);
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if upper => first.to_uppercase().chain(chars).collect(),
        _ => word.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: u32,
        name: &'static str,
    }

    fn config(title: &str) -> ListConfig<Item> {
        ListConfig::new(title, |i: &Item| i.id.to_string(), |i: &Item| i.name.to_string())
    }

    fn items() -> Vec<Item> {
        vec![
            Item { id: 1, name: "alpha" },
            Item { id: 2, name: "twin" },
            Item { id: 3, name: "twin" },
        ]
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("Categories"), "Category");
        assert_eq!(singularize("Directory Categories"), "Directory Category");
        assert_eq!(singularize("Chat Rooms"), "Chat Room");
        assert_eq!(singularize("Histories"), "History");
        assert_eq!(singularize("entries"), "entry");
        assert_eq!(singularize("Active Sessions"), "Active Session");
        assert_eq!(singularize("Staff"), "Staff");
    }

    #[test]
    fn test_empty_is_not_error() {
        let list = CrudList::new(config("Widgets"));
        assert_eq!(list.phase(), Phase::Loading);

        list.apply(Some(Vec::new()));
        assert_eq!(list.phase(), Phase::Empty);
        assert!(list.banner().is_none());

        list.apply(None);
        assert_eq!(list.phase(), Phase::Error);
        assert_eq!(
            list.banner(),
            Some(Banner::danger("Failed to load widgets. Check API connection."))
        );
    }

    #[test]
    fn test_successful_load_clears_only_danger_banner() {
        let list = CrudList::new(config("Widgets"));
        list.apply(None);
        list.apply(Some(items()));
        assert_eq!(list.phase(), Phase::Populated);
        assert!(list.banner().is_none());

        list.set_banner(Banner::success("Widget created"));
        list.apply(Some(items()));
        assert_eq!(list.banner(), Some(Banner::success("Widget created")));
    }

    #[test]
    fn test_empty_view_text() {
        let handler: Handler = Arc::new(|| async {}.boxed());
        let list = CrudList::new(config("Chat Rooms").create(CreateAffordance {
            label: "Create Room".into(),
            description: String::new(),
            icon: "material/add",
            handler,
        }));
        list.apply(Some(Vec::new()));

        match list.view().body {
            ListBody::Empty {
                message,
                create_label,
            } => {
                assert_eq!(message, "No chat rooms found");
                assert_eq!(create_label.as_deref(), Some("Create New Chat Room"));
            }
            _ => panic!("expected empty body"),
        }
    }

    #[test]
    fn test_remove_by_key_ignores_same_label() {
        let list = CrudList::new(config("Widgets"));
        list.apply(Some(items()));

        assert_eq!(list.remove_by_key("2"), 1);
        let left: Vec<u32> = list.items().iter().map(|i| i.id).collect();
        assert_eq!(left, [1, 3]);
    }

    #[test]
    fn test_remove_last_item_goes_empty() {
        let list = CrudList::new(config("Widgets"));
        list.apply(Some(vec![Item { id: 9, name: "solo" }]));
        list.remove_by_key("9");
        assert_eq!(list.phase(), Phase::Empty);
    }

    #[tokio::test]
    async fn test_row_actions_bind_their_own_item() {
        let pressed: Arc<Mutex<Vec<u32>>> = Arc::default();
        let sink = pressed.clone();
        let handler: ItemHandler<Item> = Arc::new(move |item: Item| {
            let sink = sink.clone();
            async move { sink.lock().unwrap().push(item.id) }.boxed()
        });

        let list = CrudList::new(config("Widgets").action(ActionButton {
            id: "delete",
            icon: "material/delete",
            tint: Tint::Danger,
            tooltip: "Delete".into(),
            enabled: |i: &Item| i.id != 3,
            handler,
        }));
        list.apply(Some(items()));
        let view = list.view();

        // Reload underneath the rendered view; bound actions keep their rows.
        list.apply(Some(vec![Item { id: 7, name: "new" }]));

        let rows = view.rows();
        assert!(rows[1].action("delete").unwrap().press().await);
        assert!(rows[0].action("delete").unwrap().press().await);
        assert!(!rows[2].action("delete").unwrap().enabled);
        assert!(!rows[2].action("delete").unwrap().press().await);
        assert_eq!(*pressed.lock().unwrap(), [2, 1]);
    }

    #[tokio::test]
    async fn test_one_trigger_in_flight() {
        let gate = Arc::new(Notify::new());
        let runs = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let (g, r) = (gate.clone(), runs.clone());
        let refresh: Handler = Arc::new(move || {
            let (g, r) = (g.clone(), r.clone());
            async move {
                r.fetch_add(1, Ordering::SeqCst);
                g.notified().await;
            }
            .boxed()
        });
        let creates = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = creates.clone();
        let on_create: Handler = Arc::new(move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        });
        let create = CreateAffordance {
            label: "Create Widget".into(),
            description: "Add a widget".into(),
            icon: "material/add",
            handler: on_create,
        };
        let list = CrudList::new(config("Widgets").refresh(refresh).create(create));

        let first = tokio::spawn({
            let list = list.clone();
            async move { list.trigger_refresh().await }
        });
        while !list.is_busy() {
            tokio::task::yield_now().await;
        }

        assert!(!list.trigger_refresh().await);
        assert!(!list.trigger_create().await);

        assert_eq!(creates.load(Ordering::SeqCst), 0);

        gate.notify_one();
        assert!(first.await.unwrap());
        assert!(!list.is_busy());
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        assert!(list.trigger_create().await);
        assert_eq!(creates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_icon_tint_override() {
        let list = CrudList::new(
            config("Widgets")
                .icon("material/widgets", Tint::Secondary)
                .icon_tint(|i: &Item| if i.id == 1 { Tint::Warning } else { Tint::Secondary }),
        );
        list.apply(Some(items()));
        let view = list.view();
        let tints: Vec<Tint> = view.rows().iter().map(|r| r.tint).collect();
        assert_eq!(tints, [Tint::Warning, Tint::Secondary, Tint::Secondary]);
    }
}
