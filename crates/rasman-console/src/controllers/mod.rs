//! One controller per console page.
//!
//! Controllers are built with `Arc::new_cyclic`; the handlers they put in
//! their list configs hold a `Weak` back-reference, so a list never keeps
//! its controller alive.

pub mod chat_rooms;
pub mod dashboard;
pub mod directory;
pub mod messaging;
pub mod sessions;
pub mod user_details;
pub mod users;

use std::future::Future;
use std::sync::{Arc, Weak};

use futures::FutureExt;

use crate::list::{Handler, ItemHandler};

pub use chat_rooms::ChatRoomsController;
pub use dashboard::{DashboardController, DashboardSnapshot, DashboardTimings, Stat, StatValue};
pub use directory::DirectoryController;
pub use messaging::{ComposeError, ComposeStatus, MessageComposer};
pub use sessions::{AutoRefresh, SessionsController};
pub use user_details::{SessionSource, UserDetailsController, UserDetailsSnapshot};
pub use users::UsersController;

/// A list handler that calls back into controller `C`, or does nothing once
/// the controller is gone.
pub(crate) fn bind<C, F, Fut>(controller: &Weak<C>, f: F) -> Handler
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let controller = controller.clone();
    Arc::new(move || match controller.upgrade() {
        Some(c) => f(c).boxed(),
        None => async {}.boxed(),
    })
}

/// Like [`bind`], for handlers that receive the row's item.
pub(crate) fn bind_item<C, T, F, Fut>(controller: &Weak<C>, f: F) -> ItemHandler<T>
where
    C: Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(Arc<C>, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let controller = controller.clone();
    Arc::new(move |item| match controller.upgrade() {
        Some(c) => f(c, item).boxed(),
        None => async {}.boxed(),
    })
}

/// Ask for a required text field.  `None` on cancel or blank input.
pub(crate) async fn ask_required(prompter: &dyn crate::prompt::Prompter, label: &str) -> Option<String> {
    prompter
        .ask(label)
        .await
        .map(|answer| answer.trim().to_string())
        .filter(|answer| !answer.is_empty())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use rasman_api::fake::FakeRas;
    use rasman_api::ApiClient;
    use rasman_store::Database;

    use crate::prompt::{Answer, ScriptedPrompter};
    use crate::settings::SettingsService;
    use crate::state::AppState;

    /// App state pointed at `ras`, answering prompts from `answers`.
    pub fn state_for(ras: &FakeRas, answers: impl IntoIterator<Item = Answer>) -> (AppState, Arc<ScriptedPrompter>) {
        let settings = SettingsService::open(
            Database::open_in_memory().expect("in-memory db"),
            ApiClient::unconfigured(),
        )
        .expect("settings");
        settings.override_api_url(&ras.url());

        let prompter = Arc::new(ScriptedPrompter::new(answers));
        let state = AppState::new(Arc::new(settings), prompter.clone());
        (state, prompter)
    }
}
