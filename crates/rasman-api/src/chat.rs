use reqwest::Method;
use serde_json::json;

use rasman_shared::constants::{DIRECTORY_TIMEOUT, READ_TIMEOUT};
use rasman_shared::ChatRoom;

use crate::client::ApiClient;
use crate::decode;

impl ApiClient {
    pub async fn fetch_chat_rooms(&self) -> Option<Vec<ChatRoom>> {
        const ENDPOINT: &str = "GET /chat/room/public";
        let value = self
            .read(ENDPOINT, &["chat", "room", "public"], READ_TIMEOUT)
            .await?;
        Some(decode::list(ENDPOINT, value))
    }

    pub async fn create_chat_room(&self, name: &str) -> bool {
        let body = json!({ "name": name });
        self.write(
            "POST /chat/room/public",
            Method::POST,
            &["chat", "room", "public"],
            Some(&body),
            DIRECTORY_TIMEOUT,
        )
        .await
    }

    /// Rooms are addressed by name.
    pub async fn delete_chat_room(&self, name: &str) -> bool {
        self.write::<()>(
            "DELETE /chat/room/public/{name}",
            Method::DELETE,
            &["chat", "room", "public", name],
            None,
            DIRECTORY_TIMEOUT,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::fake::{FakeRas, FakeState};

    #[tokio::test]
    async fn test_room_lifecycle() {
        let ras = FakeRas::start_with(FakeState::default().with_room("lobby"))
            .await
            .unwrap();
        let client = ras.client();

        assert!(client.create_chat_room("retro chat").await);
        let rooms = client.fetch_chat_rooms().await.unwrap();
        let names: Vec<_> = rooms.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["lobby", "retro chat"]);
        assert_eq!(
            rooms[0].display_description(),
            "0 participants • Created: 2024-01-01T00:00:00Z"
        );

        assert!(client.delete_chat_room("retro chat").await);
        assert!(ras
            .requests_matching("DELETE ")
            .contains(&"DELETE /chat/room/public/retro%20chat".to_string()));
        assert!(!client.delete_chat_room("retro chat").await);
    }
}
