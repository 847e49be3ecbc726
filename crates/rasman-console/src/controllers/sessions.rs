use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use rasman_shared::Session;

use crate::controllers::messaging::MessageComposer;
use crate::controllers::{bind, bind_item};
use crate::list::{ActionButton, Banner, CrudList, ListConfig, Tint};
use crate::state::AppState;

pub struct SessionsController {
    state: AppState,
    list: CrudList<Session>,
    mounted: AtomicBool,
    composer: Mutex<Option<Arc<MessageComposer>>>,
    weak: Weak<Self>,
}

fn session_key(session: &Session) -> String {
    if session.id.is_empty() {
        session.screen_name.clone()
    } else {
        session.id.clone()
    }
}

impl SessionsController {
    pub fn new(state: AppState) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let config = ListConfig::new(
                "Active Sessions",
                session_key,
                |s: &Session| s.screen_name.clone(),
            )
            .error_message("Failed to load sessions. Check API connection.")
            .description(Session::display_description)
            .icon("material/person", Tint::Success)
            .icon_tint(|s: &Session| {
                if s.idle_seconds > 0.0 {
                    Tint::Neutral
                } else {
                    Tint::Success
                }
            })
            .refresh(bind(weak, |c: Arc<Self>| async move { c.refresh().await }))
            .action(ActionButton {
                id: "kick",
                icon: "material/logout",
                tint: Tint::Danger,
                tooltip: "Kicking sessions is not supported in this version of RAS".into(),
                enabled: |_| false,
                handler: bind_item(weak, |c: Arc<Self>, session: Session| async move {
                    c.kick(session).await;
                }),
            })
            .on_press(bind_item(weak, |c: Arc<Self>, session: Session| async move {
                c.open_composer(&session.screen_name);
            }));

            Self {
                state,
                list: CrudList::new(config),
                mounted: AtomicBool::new(false),
                composer: Mutex::new(None),
                weak: weak.clone(),
            }
        })
    }

    pub fn list(&self) -> &CrudList<Session> {
        &self.list
    }

    pub async fn mount(&self) {
        if !self.mounted.swap(true, Ordering::AcqRel) {
            self.refresh().await;
        }
    }

    pub async fn refresh(&self) {
        self.list.begin_loading();
        let sessions = self.state.api.fetch_sessions().await;
        self.list.apply(sessions);
    }

    /// The server cannot end sessions; this only reports that.
    pub async fn kick(&self, session: Session) -> bool {
        let ok = self.state.api.kick_session(&session.id).await;
        if !ok {
            self.list.set_banner(Banner::warning(format!(
                "Cannot kick '{}': kicking sessions is not supported in this version of RAS",
                session.screen_name
            )));
        }
        ok
    }

    pub fn open_composer(&self, screen_name: &str) -> Arc<MessageComposer> {
        let composer = Arc::new(MessageComposer::new(self.state.clone(), screen_name));
        if let Ok(mut slot) = self.composer.lock() {
            *slot = Some(composer.clone());
        }
        composer
    }

    /// The composer opened by the last item press, if any.
    pub fn opened_composer(&self) -> Option<Arc<MessageComposer>> {
        self.composer.lock().ok().and_then(|slot| slot.clone())
    }

    /// Reload every `interval` until the returned handle is dropped or
    /// stopped.  The first reload happens one interval from now.  Ticks go
    /// through the list's refresh trigger, so a tick that lands while
    /// another refresh is running is skipped.
    pub fn start_auto_refresh(&self, interval: Duration) -> AutoRefresh {
        let weak = self.weak.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                if controller.list.trigger_refresh().await {
                    debug!("Auto-refreshed sessions");
                } else {
                    debug!("Sessions list busy, skipping auto-refresh tick");
                }
            }
        });
        info!(interval_secs = interval.as_secs_f64(), "Session auto-refresh started");
        AutoRefresh { task }
    }
}

/// Running auto-refresh.  Aborts the refresh task when dropped.
pub struct AutoRefresh {
    task: JoinHandle<()>,
}

impl AutoRefresh {
    pub fn stop(self) {}

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.task.abort();
    }
}
