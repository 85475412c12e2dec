use async_trait::async_trait;

use crate::error::Error;
use crate::models::credential::{AccessToken, TwitchUser};

/// Identity and token endpoints of the streaming platform.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// The account that owns `token`, or `None` if the platform returned no identity.
    async fn get_user(&self, token: &AccessToken) -> Result<Option<TwitchUser>, Error>;

    async fn refresh_token(&self, token: &AccessToken) -> Result<AccessToken, Error>;
}
