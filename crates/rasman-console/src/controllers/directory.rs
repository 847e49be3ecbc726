//! Keyword directory: categories on one list, the selected category's
//! keywords on another.
//!
//! Keywords are fetched lazily, one category at a time, into a cache keyed
//! by category id.  Each cache slot has its own loading flag so a slow
//! category never blocks the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use rasman_shared::constants::{UNCATEGORIZED_ID, UNCATEGORIZED_NAME};
use rasman_shared::{Category, Keyword};

use crate::controllers::{ask_required, bind, bind_item};
use crate::list::{
    ActionButton, Banner, CreateAffordance, CrudList, HeaderControl, ListConfig, Tint,
};
use crate::state::AppState;

#[derive(Debug, Clone, Default)]
struct KeywordSlot {
    keywords: Vec<Keyword>,
    loading: bool,
    loaded: bool,
    failed: bool,
}

struct DirectoryCache {
    selected: i64,
    slots: HashMap<i64, KeywordSlot>,
}

pub struct DirectoryController {
    state: AppState,
    categories: CrudList<Category>,
    keywords: CrudList<Keyword>,
    cache: Mutex<DirectoryCache>,
    mounted: AtomicBool,
}

impl DirectoryController {
    pub fn new(state: AppState) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let categories = ListConfig::new(
                "Directory Categories",
                |c: &Category| c.id.to_string(),
                |c: &Category| c.name.clone(),
            )
            .error_message("Failed to load directory categories. Check API connection.")
            .description(Category::display_description)
            .icon("material/folder", Tint::Primary)
            .create(CreateAffordance {
                label: "Create Category".into(),
                description: "Add a new directory category".into(),
                icon: "material/create_new_folder",
                handler: bind(weak, |c: Arc<Self>| async move { c.prompt_create_category().await }),
            })
            .refresh(bind(weak, |c: Arc<Self>| async move { c.refresh().await }))
            .action(ActionButton {
                id: "delete",
                icon: "material/delete",
                tint: Tint::Danger,
                tooltip: "Delete Category".into(),
                enabled: |c: &Category| !c.is_uncategorized(),
                handler: bind_item(weak, |c: Arc<Self>, category: Category| async move {
                    c.delete_category(category).await;
                }),
            })
            .on_press(bind_item(weak, |c: Arc<Self>, category: Category| async move {
                c.select_category(category.id).await;
            }));

            let keywords = ListConfig::new(
                keyword_title(UNCATEGORIZED_ID, None),
                |k: &Keyword| k.id.to_string(),
                |k: &Keyword| k.name.clone(),
            )
            .error_message("Failed to load keywords. Check API connection.")
            .description(Keyword::display_description)
            .icon("material/label", Tint::Secondary)
            .icon_tint(|k: &Keyword| {
                if k.category_id == UNCATEGORIZED_ID {
                    Tint::Warning
                } else {
                    Tint::Secondary
                }
            })
            .create(CreateAffordance {
                label: "Add Keyword".into(),
                description: "Add a new keyword to the selected category".into(),
                icon: "material/new_label",
                handler: bind(weak, |c: Arc<Self>| async move {
                    let category_id = c.selected();
                    c.prompt_create_keyword(category_id).await;
                }),
            })
            .refresh(bind(weak, |c: Arc<Self>| async move {
                let category_id = c.selected();
                c.load_keywords(category_id).await;
            }))
            .action(ActionButton {
                id: "delete",
                icon: "material/delete",
                tint: Tint::Danger,
                tooltip: "Delete Keyword".into(),
                enabled: |_| true,
                handler: bind_item(weak, |c: Arc<Self>, keyword: Keyword| async move {
                    c.delete_keyword(keyword).await;
                }),
            })
            .header_control(HeaderControl {
                id: "delete-category",
                label: "Delete Category".into(),
                handler: bind(weak, |c: Arc<Self>| async move {
                    c.delete_current_category().await;
                }),
            });

            Self {
                state,
                categories: CrudList::new(categories),
                keywords: CrudList::new(keywords),
                cache: Mutex::new(DirectoryCache {
                    selected: UNCATEGORIZED_ID,
                    slots: HashMap::new(),
                }),
                mounted: AtomicBool::new(false),
            }
        })
    }

    pub fn categories(&self) -> &CrudList<Category> {
        &self.categories
    }

    pub fn keywords(&self) -> &CrudList<Keyword> {
        &self.keywords
    }

    fn cache(&self) -> MutexGuard<'_, DirectoryCache> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The page banner.
    pub fn banner(&self) -> Option<Banner> {
        self.categories.banner()
    }

    /// Load categories, then preload the uncategorized keywords.
    pub async fn mount(&self) {
        if !self.mounted.swap(true, Ordering::AcqRel) {
            self.refresh().await;
            self.select_category(UNCATEGORIZED_ID).await;
        }
    }

    pub async fn refresh(&self) {
        self.categories.begin_loading();
        let categories = self.state.api.fetch_categories().await;
        self.categories.apply(categories);
        let selected = self.selected();
        self.keywords
            .set_title(keyword_title(selected, self.category_name(selected).as_deref()));
    }

    // -----------------------------------------------------------------------
    // Selection and keyword cache
    // -----------------------------------------------------------------------

    /// Category switcher entries: "Uncategorized" first, always.
    pub fn switcher(&self) -> Vec<(i64, String)> {
        std::iter::once((UNCATEGORIZED_ID, UNCATEGORIZED_NAME.to_string()))
            .chain(
                self.categories
                    .items()
                    .into_iter()
                    .filter(|c| !c.is_uncategorized())
                    .map(|c| (c.id, c.name)),
            )
            .collect()
    }

    pub fn selected(&self) -> i64 {
        self.cache().selected
    }

    fn category_name(&self, category_id: i64) -> Option<String> {
        self.categories
            .find(|c| c.id == category_id)
            .map(|c| c.name)
    }

    /// Switch the keyword list to `category_id`, fetching its keywords the
    /// first time it is selected.
    pub async fn select_category(&self, category_id: i64) {
        let needs_load = {
            let mut cache = self.cache();
            cache.selected = category_id;
            !cache.slots.get(&category_id).is_some_and(|s| s.loaded || s.loading)
        };
        self.keywords
            .set_title(keyword_title(category_id, self.category_name(category_id).as_deref()));

        if needs_load {
            self.load_keywords(category_id).await;
        } else {
            self.sync_keywords();
        }
    }

    /// (Re)fetch one category's keywords into the cache.  On failure the
    /// previously cached keywords stay.
    pub async fn load_keywords(&self, category_id: i64) {
        self.cache().slots.entry(category_id).or_default().loading = true;
        self.sync_if_selected(category_id);

        let fetched = self.state.api.fetch_keywords(category_id).await;

        {
            let mut cache = self.cache();
            let slot = cache.slots.entry(category_id).or_default();
            slot.loading = false;
            match fetched {
                Some(keywords) => {
                    slot.keywords = keywords;
                    slot.loaded = true;
                    slot.failed = false;
                }
                None => {
                    debug!(category_id, "Keyword fetch failed, keeping cached keywords");
                    slot.failed = true;
                }
            }
        }
        self.sync_if_selected(category_id);
    }

    /// Whether a category's keywords are still loading.  Never-requested
    /// categories count as loading.
    pub fn is_loading(&self, category_id: i64) -> bool {
        self.cache()
            .slots
            .get(&category_id)
            .map_or(true, |slot| slot.loading)
    }

    pub fn cached_keywords(&self, category_id: i64) -> Option<Vec<Keyword>> {
        self.cache()
            .slots
            .get(&category_id)
            .filter(|slot| slot.loaded)
            .map(|slot| slot.keywords.clone())
    }

    fn sync_if_selected(&self, category_id: i64) {
        if self.selected() == category_id {
            self.sync_keywords();
        }
    }

    /// Push the selected slot into the keyword list.
    fn sync_keywords(&self) {
        let slot = {
            let cache = self.cache();
            cache.slots.get(&cache.selected).cloned().unwrap_or(KeywordSlot {
                loading: true,
                ..KeywordSlot::default()
            })
        };

        if slot.loading {
            self.keywords.begin_loading();
        } else if slot.failed && !slot.loaded {
            self.keywords.apply(None);
        } else {
            self.keywords.apply(Some(slot.keywords));
        }
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    pub async fn prompt_create_category(&self) {
        match ask_required(self.state.prompter.as_ref(), "Category Name").await {
            Some(name) => {
                self.create_category(&name).await;
            }
            None => self
                .categories
                .set_banner(Banner::danger("Category name is required")),
        }
    }

    pub async fn create_category(&self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            self.categories
                .set_banner(Banner::danger("Category name is required"));
            return false;
        }

        let ok = self.state.api.create_category(name).await;
        self.categories.set_banner(Banner::outcome(
            ok,
            format!("Category '{name}' created successfully"),
            format!("Failed to create category '{name}'"),
        ));
        if ok {
            self.refresh().await;
        }
        ok
    }

    /// Delete after confirmation.  "Uncategorized" is refused up front.
    /// Deleting the selected category switches back to "Uncategorized".
    pub async fn delete_category(&self, category: Category) -> bool {
        if category.is_uncategorized() {
            self.categories.set_banner(Banner::warning(
                "The Uncategorized category cannot be deleted",
            ));
            return false;
        }

        let confirmed = self
            .state
            .prompter
            .confirm(
                "Confirm Delete",
                &format!(
                    "Are you sure you want to delete category '{}'? This will also delete all keywords in this category.",
                    category.name
                ),
            )
            .await;
        if !confirmed {
            return false;
        }

        let ok = self.state.api.delete_category(category.id).await;
        self.categories.set_banner(Banner::outcome(
            ok,
            format!("Category '{}' deleted successfully", category.name),
            format!("Failed to delete category '{}'", category.name),
        ));
        if !ok {
            return false;
        }

        self.categories.remove_by_key(&category.id.to_string());
        let was_selected = {
            let mut cache = self.cache();
            cache.slots.remove(&category.id);
            cache.selected == category.id
        };
        if was_selected {
            self.select_category(UNCATEGORIZED_ID).await;
        }
        true
    }

    /// Delete whatever category is selected.  Nothing happens while
    /// "Uncategorized" is selected.
    pub async fn delete_current_category(&self) -> bool {
        let selected = self.selected();
        if selected == UNCATEGORIZED_ID {
            return false;
        }
        match self.categories.find(|c| c.id == selected) {
            Some(category) => self.delete_category(category).await,
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Keywords
    // -----------------------------------------------------------------------

    pub async fn prompt_create_keyword(&self, category_id: i64) {
        match ask_required(self.state.prompter.as_ref(), "Keyword Name").await {
            Some(name) => {
                self.create_keyword(&name, category_id).await;
            }
            None => self
                .categories
                .set_banner(Banner::danger("Keyword name is required")),
        }
    }

    /// Create a keyword and reload its category.
    pub async fn create_keyword(&self, name: &str, category_id: i64) -> bool {
        let name = name.trim();
        if name.is_empty() {
            self.categories
                .set_banner(Banner::danger("Keyword name is required"));
            return false;
        }

        let ok = self.state.api.create_keyword(name, category_id).await;
        self.categories.set_banner(Banner::outcome(
            ok,
            format!("Keyword '{name}' created successfully"),
            format!("Failed to create keyword '{name}'"),
        ));
        if ok {
            self.load_keywords(category_id).await;
        }
        ok
    }

    /// Delete after confirmation, patching the cached category in place.
    pub async fn delete_keyword(&self, keyword: Keyword) -> bool {
        let confirmed = self
            .state
            .prompter
            .confirm(
                "Confirm Delete",
                &format!("Are you sure you want to delete keyword '{}'?", keyword.name),
            )
            .await;
        if !confirmed {
            return false;
        }

        let ok = self.state.api.delete_keyword(keyword.id).await;
        self.categories.set_banner(Banner::outcome(
            ok,
            format!("Keyword '{}' deleted successfully", keyword.name),
            format!("Failed to delete keyword '{}'", keyword.name),
        ));
        if ok {
            if let Some(slot) = self.cache().slots.get_mut(&keyword.category_id) {
                slot.keywords.retain(|k| k.id != keyword.id);
            }
            self.sync_if_selected(keyword.category_id);
        }
        ok
    }
}

fn keyword_title(category_id: i64, name: Option<&str>) -> String {
    if category_id == UNCATEGORIZED_ID {
        "Uncategorized Keywords".to_string()
    } else {
        format!("Keywords in \"{}\"", name.unwrap_or("Unknown"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::testing::state_for;
    use crate::list::Phase;
    use crate::prompt::Answer;
    use rasman_api::fake::{FakeRas, FakeState, Route};

    fn seeded() -> FakeState {
        let mut state = FakeState::default()
            .with_category(1, "Music")
            .with_category(2, "Games")
            .with_keyword(10, "jazz", 1)
            .with_keyword(11, "blues", 1)
            .with_keyword(12, "doom", 2)
            .with_keyword(13, "misc", 0);
        state.aggregate_keywords = false;
        state
    }

    #[tokio::test]
    async fn test_mount_preloads_uncategorized() {
        let ras = FakeRas::start_with(seeded()).await.unwrap();
        let (state, _) = state_for(&ras, []);
        let directory = DirectoryController::new(state);
        directory.mount().await;

        assert_eq!(
            directory.switcher(),
            [
                (0, "Uncategorized".to_string()),
                (1, "Music".to_string()),
                (2, "Games".to_string())
            ]
        );
        assert_eq!(directory.selected(), 0);
        assert_eq!(directory.keywords().title(), "Uncategorized Keywords");
        let names: Vec<String> = directory.keywords().items().into_iter().map(|k| k.name).collect();
        assert_eq!(names, ["misc"]);
        assert!(!directory.is_loading(0));
        assert!(directory.is_loading(1));
    }

    #[tokio::test]
    async fn test_switcher_keeps_uncategorized_when_categories_fail() {
        let ras = FakeRas::start_with(seeded().failing(Route::Categories))
            .await
            .unwrap();
        let (state, _) = state_for(&ras, []);
        let directory = DirectoryController::new(state);
        directory.mount().await;

        assert_eq!(directory.switcher(), [(0, "Uncategorized".to_string())]);
        assert_eq!(
            directory.banner(),
            Some(Banner::danger(
                "Failed to load directory categories. Check API connection."
            ))
        );
    }

    #[tokio::test]
    async fn test_select_fetches_each_category_once() {
        let ras = FakeRas::start_with(seeded()).await.unwrap();
        let (state, _) = state_for(&ras, []);
        let directory = DirectoryController::new(state);
        directory.mount().await;

        let view = directory.categories().view();
        let music = view.rows().iter().find(|r| r.key == "1").unwrap();
        assert!(music.press().await);
        assert_eq!(directory.keywords().title(), "Keywords in \"Music\"");
        assert_eq!(directory.keywords().items().len(), 2);
        assert!(directory
            .keywords()
            .items()
            .iter()
            .all(|k| k.category_id == 1));

        directory.select_category(0).await;
        directory.select_category(1).await;
        assert_eq!(
            ras.requests_matching("GET /directory/category/1/keyword").len(),
            1
        );
    }

    #[tokio::test]
    async fn test_uncategorized_is_never_deleted() {
        let ras = FakeRas::start_with(seeded()).await.unwrap();
        let (state, _) = state_for(&ras, [Answer::Yes]);
        let directory = DirectoryController::new(state);
        directory.mount().await;

        assert!(!directory.delete_current_category().await);
        assert!(
            !directory
                .delete_category(Category {
                    id: 0,
                    name: "Uncategorized".into()
                })
                .await
        );
        assert!(ras.requests_matching("DELETE").is_empty());
    }

    #[tokio::test]
    async fn test_deleting_selected_category_reselects_uncategorized() {
        let ras = FakeRas::start_with(seeded()).await.unwrap();
        let (state, _) = state_for(&ras, [Answer::Yes]);
        let directory = DirectoryController::new(state);
        directory.mount().await;
        directory.select_category(2).await;

        let view = directory.keywords().view();
        assert!(view.header[0].id == "delete-category");
        view.header[0].press().await;

        assert_eq!(directory.selected(), 0);
        assert_eq!(directory.keywords().title(), "Uncategorized Keywords");
        assert!(directory.cached_keywords(2).is_none());
        assert_eq!(
            directory.switcher(),
            [(0, "Uncategorized".to_string()), (1, "Music".to_string())]
        );
    }

    #[tokio::test]
    async fn test_create_keyword_reloads_its_category() {
        let ras = FakeRas::start_with(seeded()).await.unwrap();
        let (state, _) = state_for(&ras, [Answer::Text("bebop".into())]);
        let directory = DirectoryController::new(state);
        directory.mount().await;
        directory.select_category(1).await;

        assert!(directory.keywords().trigger_create().await);
        let names: Vec<String> = directory.keywords().items().into_iter().map(|k| k.name).collect();
        assert_eq!(names, ["jazz", "blues", "bebop"]);
        assert_eq!(
            ras.requests_matching("GET /directory/category/1/keyword").len(),
            2
        );
    }

    #[tokio::test]
    async fn test_delete_keyword_patches_cache() {
        let ras = FakeRas::start_with(seeded()).await.unwrap();
        let (state, _) = state_for(&ras, [Answer::Yes]);
        let directory = DirectoryController::new(state);
        directory.mount().await;
        directory.select_category(1).await;

        let view = directory.keywords().view();
        let jazz = view.rows().iter().find(|r| r.label == "jazz").unwrap();
        assert!(jazz.action("delete").unwrap().press().await);

        let names: Vec<String> = directory.keywords().items().into_iter().map(|k| k.name).collect();
        assert_eq!(names, ["blues"]);
        assert_eq!(directory.cached_keywords(1).unwrap().len(), 1);
        assert_eq!(
            ras.requests_matching("GET /directory/category/1/keyword").len(),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_keyword_load_shows_error_then_recovers() {
        let ras = FakeRas::start_with(seeded().failing(Route::Keywords))
            .await
            .unwrap();
        let (state, _) = state_for(&ras, []);
        let directory = DirectoryController::new(state);
        directory.mount().await;
        assert_eq!(directory.keywords().phase(), Phase::Error);

        ras.state().failing.clear();
        assert!(directory.keywords().trigger_refresh().await);
        assert_eq!(directory.keywords().phase(), Phase::Populated);
    }
}
