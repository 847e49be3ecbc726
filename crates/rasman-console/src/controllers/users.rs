use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;

use rasman_shared::{SuspendedStatus, User};

use crate::controllers::user_details::UserDetailsController;
use crate::controllers::{ask_required, bind, bind_item};
use crate::list::{ActionButton, Banner, CreateAffordance, CrudList, ListConfig, Tint};
use crate::state::AppState;

pub struct UsersController {
    state: AppState,
    list: CrudList<User>,
    mounted: AtomicBool,
    opened: Mutex<Option<Arc<UserDetailsController>>>,
}

fn user_key(user: &User) -> String {
    if user.id.is_empty() {
        user.screen_name.clone()
    } else {
        user.id.clone()
    }
}

impl UsersController {
    pub fn new(state: AppState) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let config = ListConfig::new("User Accounts", user_key, |u: &User| u.screen_name.clone())
                .error_message("Failed to load users. Check API connection.")
                .description(User::display_description)
                .icon("material/person", Tint::Primary)
                .icon_tint(|u: &User| if u.is_active() { Tint::Primary } else { Tint::Warning })
                .create(CreateAffordance {
                    label: "Create User".into(),
                    description: "Add a new AIM account".into(),
                    icon: "material/person_add",
                    handler: bind(weak, |c: Arc<Self>| async move { c.prompt_create().await }),
                })
                .refresh(bind(weak, |c: Arc<Self>| async move { c.refresh().await }))
                .action(ActionButton {
                    id: "status",
                    icon: "material/manage_accounts",
                    tint: Tint::Primary,
                    tooltip: "Update Account Status".into(),
                    enabled: |_| true,
                    handler: bind_item(weak, |c: Arc<Self>, user: User| async move {
                        c.prompt_update_status(user).await;
                    }),
                })
                .action(ActionButton {
                    id: "reset-password",
                    icon: "material/key",
                    tint: Tint::Warning,
                    tooltip: "Reset Password".into(),
                    enabled: |_| true,
                    handler: bind_item(weak, |c: Arc<Self>, user: User| async move {
                        c.prompt_reset_password(user).await;
                    }),
                })
                .action(ActionButton {
                    id: "delete",
                    icon: "material/delete",
                    tint: Tint::Danger,
                    tooltip: "Delete User".into(),
                    enabled: |_| true,
                    handler: bind_item(weak, |c: Arc<Self>, user: User| async move {
                        c.delete_user(user).await;
                    }),
                })
                .on_press(bind_item(weak, |c: Arc<Self>, user: User| async move {
                    c.open_details(&user.screen_name).await;
                }));

            Self {
                state,
                list: CrudList::new(config),
                mounted: AtomicBool::new(false),
                opened: Mutex::new(None),
            }
        })
    }

    pub fn list(&self) -> &CrudList<User> {
        &self.list
    }

    /// First load.  Later calls do nothing; use [`Self::refresh`].
    pub async fn mount(&self) {
        if !self.mounted.swap(true, Ordering::AcqRel) {
            self.refresh().await;
        }
    }

    pub async fn refresh(&self) {
        self.list.begin_loading();
        let users = self.state.api.fetch_users().await;
        self.list.apply(users);
    }

    /// A loaded user by screen name (case-insensitive).
    pub fn find(&self, screen_name: &str) -> Option<User> {
        self.list
            .find(|u| u.screen_name.eq_ignore_ascii_case(screen_name.trim()))
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    pub async fn prompt_create(&self) {
        let prompter = self.state.prompter.clone();
        let Some(screen_name) = ask_required(prompter.as_ref(), "Screen Name").await else {
            self.list
                .set_banner(Banner::danger("Screen name and password are required"));
            return;
        };
        let Some(password) = ask_required(prompter.as_ref(), "Password").await else {
            self.list
                .set_banner(Banner::danger("Screen name and password are required"));
            return;
        };
        self.create_user(&screen_name, &password).await;
    }

    pub async fn create_user(&self, screen_name: &str, password: &str) -> bool {
        let screen_name = screen_name.trim();
        if screen_name.is_empty() || password.is_empty() {
            self.list
                .set_banner(Banner::danger("Screen name and password are required"));
            return false;
        }

        let ok = self.state.api.create_user(screen_name, password).await;
        self.list.set_banner(Banner::outcome(
            ok,
            format!("User '{screen_name}' created successfully"),
            format!("Failed to create user '{screen_name}'"),
        ));
        if ok {
            info!(screen_name, "User created");
            self.refresh().await;
        }
        ok
    }

    // -----------------------------------------------------------------------
    // Row actions
    // -----------------------------------------------------------------------

    /// Delete after confirmation.  Only the deleted record leaves the list.
    pub async fn delete_user(&self, user: User) -> bool {
        let confirmed = self
            .state
            .prompter
            .confirm(
                "Confirm Delete",
                &format!(
                    "Are you sure you want to delete user '{}'? This action cannot be undone.",
                    user.screen_name
                ),
            )
            .await;
        if !confirmed {
            return false;
        }

        let ok = self.state.api.delete_user(&user.screen_name).await;
        self.list.set_banner(Banner::outcome(
            ok,
            format!("User '{}' deleted successfully", user.screen_name),
            format!("Failed to delete user '{}'", user.screen_name),
        ));
        if ok {
            self.list.remove_by_key(&user_key(&user));
        }
        ok
    }

    pub async fn prompt_reset_password(&self, user: User) -> bool {
        let label = format!("New Password for {}", user.screen_name);
        match ask_required(self.state.prompter.as_ref(), &label).await {
            Some(password) => self.reset_password(&user, &password).await,
            None => false,
        }
    }

    pub async fn reset_password(&self, user: &User, password: &str) -> bool {
        let ok = !password.is_empty()
            && self
                .state
                .api
                .reset_user_password(&user.screen_name, password)
                .await;
        self.list.set_banner(Banner::outcome(
            ok,
            format!("Password for '{}' reset successfully", user.screen_name),
            format!("Failed to reset password for '{}'", user.screen_name),
        ));
        ok
    }

    pub async fn prompt_update_status(&self, user: User) -> bool {
        let choices = SuspendedStatus::choices();
        let labels: Vec<String> = choices.iter().map(|(label, _)| label.to_string()).collect();
        let label = format!("Update Status for {}", user.screen_name);

        match self.state.prompter.choose(&label, &labels).await {
            Some(index) => {
                let status = choices.into_iter().nth(index).and_then(|(_, status)| status);
                self.update_status(user, status).await
            }
            None => false,
        }
    }

    /// Set the account status and patch the matching record in place.
    pub async fn update_status(&self, user: User, status: Option<SuspendedStatus>) -> bool {
        let ok = self
            .state
            .api
            .update_user_status(&user.screen_name, status.as_ref())
            .await;
        self.list.set_banner(Banner::outcome(
            ok,
            format!(
                "Status for '{}' updated to {}",
                user.screen_name,
                SuspendedStatus::label_of(status.as_ref())
            ),
            format!("Failed to update status for '{}'", user.screen_name),
        ));
        if ok {
            self.list.replace(User {
                suspended_status: status,
                ..user
            });
        }
        ok
    }

    // -----------------------------------------------------------------------
    // Details
    // -----------------------------------------------------------------------

    pub async fn open_details(&self, screen_name: &str) -> Arc<UserDetailsController> {
        let details = UserDetailsController::new(self.state.clone(), screen_name);
        details.load().await;
        if let Ok(mut opened) = self.opened.lock() {
            *opened = Some(details.clone());
        }
        details
    }

    /// The details page opened by the last item press, if any.
    pub fn opened_details(&self) -> Option<Arc<UserDetailsController>> {
        self.opened.lock().ok().and_then(|opened| opened.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::testing::state_for;
    use crate::list::Phase;
    use crate::prompt::Answer;
    use rasman_api::fake::{FakeRas, FakeState, Route};

    #[tokio::test]
    async fn test_mount_loads_once() {
        let ras = FakeRas::start_with(FakeState::default().with_user("alice"))
            .await
            .unwrap();
        let (state, _) = state_for(&ras, []);
        let users = UsersController::new(state);

        users.mount().await;
        users.mount().await;
        assert_eq!(users.list().phase(), Phase::Populated);
        assert_eq!(ras.requests_matching("GET /user").len(), 1);
    }

    #[tokio::test]
    async fn test_empty_and_failure_differ() {
        let ras = FakeRas::start().await.unwrap();
        let (state, _) = state_for(&ras, []);
        let users = UsersController::new(state);
        users.mount().await;
        assert_eq!(users.list().phase(), Phase::Empty);
        assert!(users.list().banner().is_none());

        ras.state().failing.insert(Route::Users);
        users.refresh().await;
        assert_eq!(users.list().phase(), Phase::Error);
        assert_eq!(
            users.list().banner().unwrap().text,
            "Failed to load users. Check API connection."
        );
    }

    #[tokio::test]
    async fn test_create_through_list_prompts_and_reloads() {
        let ras = FakeRas::start().await.unwrap();
        let (state, prompter) = state_for(
            &ras,
            [Answer::Text("newbie".into()), Answer::Text("pw".into())],
        );
        let users = UsersController::new(state);
        users.mount().await;

        assert!(users.list().trigger_create().await);
        assert_eq!(prompter.asked(), ["Screen Name", "Password"]);
        assert_eq!(
            users.list().banner(),
            Some(Banner::success("User 'newbie' created successfully"))
        );
        assert!(users.find("NEWBIE").is_some());
        assert_eq!(ras.requests_matching("GET /user").len(), 2);
    }

    #[tokio::test]
    async fn test_create_requires_both_fields() {
        let ras = FakeRas::start().await.unwrap();
        let (state, _) = state_for(&ras, [Answer::Text("lonely".into()), Answer::Cancel]);
        let users = UsersController::new(state);

        users.prompt_create().await;
        assert!(!users.create_user("  ", "pw").await);
        assert!(ras.requests_matching("POST").is_empty());
    }

    #[tokio::test]
    async fn test_delete_action_removes_pressed_row_only() {
        let ras = FakeRas::start_with(
            FakeState::default()
                .with_user("alice")
                .with_user("bob")
                .with_user("carol"),
        )
        .await
        .unwrap();
        let (state, _) = state_for(&ras, [Answer::Yes]);
        let users = UsersController::new(state);
        users.mount().await;

        let view = users.list().view();
        assert!(view.rows()[1].action("delete").unwrap().press().await);

        let names: Vec<String> = users.list().items().into_iter().map(|u| u.screen_name).collect();
        assert_eq!(names, ["alice", "carol"]);
        assert_eq!(ras.state().users.len(), 2);
    }

    #[tokio::test]
    async fn test_declined_delete_sends_nothing() {
        let ras = FakeRas::start_with(FakeState::default().with_user("alice"))
            .await
            .unwrap();
        let (state, _) = state_for(&ras, [Answer::No]);
        let users = UsersController::new(state);
        users.mount().await;

        let alice = users.find("alice").unwrap();
        assert!(!users.delete_user(alice).await);
        assert!(ras.requests_matching("DELETE").is_empty());
    }

    #[tokio::test]
    async fn test_status_update_patches_record() {
        let ras = FakeRas::start_with(FakeState::default().with_user("alice").with_user("bob"))
            .await
            .unwrap();
        let (state, _) = state_for(&ras, [Answer::Choice(3)]);
        let users = UsersController::new(state);
        users.mount().await;

        let view = users.list().view();
        assert!(view.rows()[0].action("status").unwrap().press().await);

        let alice = users.find("alice").unwrap();
        assert_eq!(alice.suspended_status, Some(SuspendedStatus::Suspended));
        assert!(users.find("bob").unwrap().is_active());
        assert_eq!(
            users.list().banner().unwrap().text,
            "Status for 'alice' updated to Suspended"
        );
        // Patched locally, not reloaded.
        assert_eq!(ras.requests_matching("GET /user").len(), 1);
    }

    #[tokio::test]
    async fn test_reset_password_action() {
        let ras = FakeRas::start_with(FakeState::default().with_user("alice"))
            .await
            .unwrap();
        let (state, _) = state_for(&ras, [Answer::Text("n3w".into())]);
        let users = UsersController::new(state);
        users.mount().await;

        let view = users.list().view();
        assert!(view.rows()[0].action("reset-password").unwrap().press().await);
        assert_eq!(
            ras.state().passwords.get("alice").map(String::as_str),
            Some("n3w")
        );
    }

    #[tokio::test]
    async fn test_press_opens_details() {
        let ras = FakeRas::start_with(
            FakeState::default()
                .with_user("alice")
                .with_user("bob")
                .with_session("bob"),
        )
        .await
        .unwrap();
        let (state, _) = state_for(&ras, []);
        let users = UsersController::new(state);
        users.mount().await;

        let view = users.list().view();
        assert!(view.rows()[1].press().await);
        let details = users.opened_details().unwrap();
        assert_eq!(details.screen_name(), "bob");
        assert_eq!(details.snapshot().sessions.len(), 1);
    }
}
