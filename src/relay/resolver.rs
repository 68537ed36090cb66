//! Author lookup for notices.

use crate::client::{ChatClient, ClientError};
use crate::message::User;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves user ids into display identities through the chat client
#[derive(Clone)]
pub struct UserResolver {
    client: Arc<dyn ChatClient>,
}

impl UserResolver {
    /// Create a resolver over `client`
    #[must_use]
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }

    /// Look up a user
    ///
    /// Users without a public username resolve to `None`.
    ///
    /// # Errors
    ///
    /// Returns the client error if the lookup fails.
    pub async fn resolve(&self, user_id: i64) -> Result<Option<User>, ClientError> {
        let profile = self.client.get_user(user_id).await?;
        let Some(username) = profile.username.filter(|u| !u.is_empty()) else {
            return Ok(None);
        };
        Ok(Some(User {
            id: profile.id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            username,
            phone_number: profile.phone_number,
        }))
    }

    /// Author line of a notice: the display name, or `User **#<id>**`
    pub async fn author_label(&self, user_id: i64) -> String {
        match self.resolve(user_id).await {
            Ok(Some(user)) => user.display_name(),
            Ok(None) => {
                debug!("User {user_id} has no username");
                fallback_label(user_id)
            }
            Err(e) => {
                warn!("Failed to resolve user {user_id}: {e}");
                fallback_label(user_id)
            }
        }
    }
}

fn fallback_label(user_id: i64) -> String {
    format!("User **#{user_id}**")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockChatClient, UserProfile};
    use crate::testing::ada;
    use mockall::predicate::*;

    #[tokio::test]
    async fn test_resolves_user_with_username() {
        let mut client = MockChatClient::new();
        client
            .expect_get_user()
            .with(eq(7))
            .times(1)
            .returning(|_| Ok(ada()));

        let resolver = UserResolver::new(Arc::new(client));
        assert_eq!(resolver.author_label(7).await, "Ada Lovelace [@ada]");
    }

    #[tokio::test]
    async fn test_missing_username_is_none() -> Result<(), ClientError> {
        let mut client = MockChatClient::new();
        client.expect_get_user().returning(|id| {
            Ok(UserProfile {
                id,
                first_name: "Bob".into(),
                ..UserProfile::default()
            })
        });

        let resolver = UserResolver::new(Arc::new(client));
        assert_eq!(resolver.resolve(9).await?, None);
        assert_eq!(resolver.author_label(9).await, "User **#9**");
        Ok(())
    }

    #[tokio::test]
    async fn test_errors_fall_back_to_id() {
        let mut client = MockChatClient::new();
        client
            .expect_get_user()
            .returning(|_| Err(ClientError::Network("reset".into())));

        let resolver = UserResolver::new(Arc::new(client));
        assert!(resolver.resolve(5).await.is_err());
        assert_eq!(resolver.author_label(5).await, "User **#5**");
    }
}
