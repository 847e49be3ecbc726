use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rasman_shared::ChatRoom;

use crate::controllers::{ask_required, bind, bind_item};
use crate::list::{ActionButton, Banner, CreateAffordance, CrudList, ListConfig, Tint};
use crate::state::AppState;

pub struct ChatRoomsController {
    state: AppState,
    list: CrudList<ChatRoom>,
    mounted: AtomicBool,
}

impl ChatRoomsController {
    pub fn new(state: AppState) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let config = ListConfig::new(
                "Chat Rooms",
                |r: &ChatRoom| r.name.clone(),
                |r: &ChatRoom| r.name.clone(),
            )
            .error_message("Failed to load chat rooms. Check API connection.")
            .description(ChatRoom::display_description)
            .icon("material/forum", Tint::Secondary)
            .create(CreateAffordance {
                label: "Create Room".into(),
                description: "Add a new public chat room".into(),
                icon: "material/add_comment",
                handler: bind(weak, |c: Arc<Self>| async move { c.prompt_create().await }),
            })
            .refresh(bind(weak, |c: Arc<Self>| async move { c.refresh().await }))
            .action(ActionButton {
                id: "delete",
                icon: "material/delete",
                tint: Tint::Danger,
                tooltip: "Delete Chat Room".into(),
                enabled: |_| true,
                handler: bind_item(weak, |c: Arc<Self>, room: ChatRoom| async move {
                    c.delete_room(room).await;
                }),
            });

            Self {
                state,
                list: CrudList::new(config),
                mounted: AtomicBool::new(false),
            }
        })
    }

    pub fn list(&self) -> &CrudList<ChatRoom> {
        &self.list
    }

    pub async fn mount(&self) {
        if !self.mounted.swap(true, Ordering::AcqRel) {
            self.refresh().await;
        }
    }

    pub async fn refresh(&self) {
        self.list.begin_loading();
        let rooms = self.state.api.fetch_chat_rooms().await;
        self.list.apply(rooms);
    }

    pub async fn prompt_create(&self) {
        match ask_required(self.state.prompter.as_ref(), "Room Name").await {
            Some(name) => {
                self.create_room(&name).await;
            }
            None => self.list.set_banner(Banner::danger("Room name is required")),
        }
    }

    pub async fn create_room(&self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            self.list.set_banner(Banner::danger("Room name is required"));
            return false;
        }

        let ok = self.state.api.create_chat_room(name).await;
        self.list.set_banner(Banner::outcome(
            ok,
            format!("Chat room '{name}' created successfully"),
            format!("Failed to create chat room '{name}'"),
        ));
        if ok {
            self.refresh().await;
        }
        ok
    }

    pub async fn delete_room(&self, room: ChatRoom) -> bool {
        let confirmed = self
            .state
            .prompter
            .confirm(
                "Confirm Delete",
                &format!(
                    "Are you sure you want to delete chat room '{}'? This will remove the room and disconnect all participants.",
                    room.name
                ),
            )
            .await;
        if !confirmed {
            return false;
        }

        let ok = self.state.api.delete_chat_room(&room.name).await;
        self.list.set_banner(Banner::outcome(
            ok,
            format!("Chat room '{}' deleted successfully", room.name),
            format!("Failed to delete chat room '{}'", room.name),
        ));
        if ok {
            self.list.remove_by_key(&room.name);
        }
        ok
    }

    pub fn find(&self, name: &str) -> Option<ChatRoom> {
        self.list.find(|r| r.name == name)
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
    async fn test_create_and_delete() {
        let ras = FakeRas::start_with(FakeState::default().with_room("lobby"))
            .await
            .unwrap();
        let (state, _) = state_for(&ras, [Answer::Text("retro".into()), Answer::Yes]);
        let rooms = ChatRoomsController::new(state);
        rooms.mount().await;

        assert!(rooms.list().trigger_create().await);
        assert!(rooms.find("retro").is_some());

        let view = rooms.list().view();
        let lobby = view.rows().iter().find(|r| r.key == "lobby").unwrap();
        assert!(lobby.action("delete").unwrap().press().await);
        let names: Vec<String> = rooms.list().items().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["retro"]);
    }

    #[tokio::test]
    async fn test_refresh_after_failure_recovers() {
        let ras = FakeRas::start_with(FakeState::default().failing(Route::Rooms))
            .await
            .unwrap();
        let (state, _) = state_for(&ras, []);
        let rooms = ChatRoomsController::new(state);
        rooms.mount().await;
        assert_eq!(rooms.list().phase(), Phase::Error);

        ras.state().failing.clear();
        assert!(rooms.list().trigger_refresh().await);
        assert_eq!(rooms.list().phase(), Phase::Empty);
        assert!(rooms.list().banner().is_none());
    }

    #[tokio::test]
    async fn test_failed_create_keeps_list() {
        let ras = FakeRas::start_with(FakeState::default().with_room("lobby"))
            .await
            .unwrap();
        let (state, _) = state_for(&ras, []);
        let rooms = ChatRoomsController::new(state);
        rooms.mount().await;

        assert!(!rooms.create_room("lobby").await);
        assert_eq!(
            rooms.list().banner(),
            Some(Banner::danger("Failed to create chat room 'lobby'"))
        );
        assert_eq!(rooms.list().items().len(), 1);
    }
}
