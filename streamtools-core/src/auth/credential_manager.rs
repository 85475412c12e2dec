// streamtools-core/src/auth/credential_manager.rs
//
// Owns the access-token lifecycle: periodic validation, refresh ahead of
// expiry, revocation handling and change notification over the event bus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::ConfigStore;
use crate::eventbus::{AppEvent, EventBus};
use crate::models::{AccessToken, CredentialState, TwitchUser};
use crate::traits::IdentityApi;
use crate::Error;

/// Tokens expiring within this window are refreshed proactively.
pub const REFRESH_LOOKAHEAD_HOURS: i64 = 1;

pub struct CredentialManager {
    config: Arc<ConfigStore>,
    api: Arc<dyn IdentityApi>,
    bus: EventBus,
    state: Mutex<CredentialState>,
    valid: AtomicBool,
    /// Serializes validation passes and the explicit entry points.
    pass_lock: tokio::sync::Mutex<()>,
}

impl CredentialManager {
    pub fn new(config: Arc<ConfigStore>, api: Arc<dyn IdentityApi>, bus: EventBus) -> Self {
        Self {
            config,
            api,
            bus,
            state: Mutex::new(CredentialState::NoToken),
            valid: AtomicBool::new(false),
            pass_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> CredentialState {
        *self.state.lock()
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    pub fn username(&self) -> Option<String> {
        self.config.read(|c| c.twitch_username.clone())
    }

    pub fn token(&self) -> Option<AccessToken> {
        self.config.read(|c| c.oauth.clone()).filter(|t| !t.is_empty())
    }

    /// One validation pass: refresh if the token expires within the
    /// lookahead window, then confirm the identity behind it.
    pub async fn check_credentials(&self) -> CredentialState {
        let _pass = self.pass_lock.lock().await;
        self.run_pass(Utc::now()).await
    }

    /// Same as `check_credentials` with an explicit clock.
    pub async fn check_credentials_at(&self, now: DateTime<Utc>) -> CredentialState {
        let _pass = self.pass_lock.lock().await;
        self.run_pass(now).await
    }

    /// Explicit login. Persists the new token (and the username if the
    /// platform knows it), announces the change, then re-validates.
    pub async fn update_credentials(
        &self,
        bearer: &str,
        refresh: &str,
        expires_utc: DateTime<Utc>,
    ) -> CredentialState {
        let _pass = self.pass_lock.lock().await;
        let token = AccessToken::new(bearer, refresh, Some(expires_utc));

        let login = match self.api.get_user(&token).await {
            Ok(user) => user.map(|u| u.login).filter(|l| !l.trim().is_empty()),
            Err(e) => {
                debug!("(CredentialManager) identity lookup for new token failed => {e}");
                None
            }
        };

        self.config.update(|c| {
            c.oauth = Some(token.clone());
            c.twitch_username = login;
        });
        self.config.persist();
        self.bus.publish(AppEvent::CredentialsChanged(Some(token)));

        self.run_pass(Utc::now()).await
    }

    /// Logout / revocation. Fires both notifications.
    pub async fn delete_credentials(&self) {
        let _pass = self.pass_lock.lock().await;
        self.clear();
        self.bus.publish(AppEvent::CredentialsStatusChanged(false));
    }

    async fn run_pass(&self, now: DateTime<Utc>) -> CredentialState {
        let was_valid = self.is_valid();

        let Some(token) = self.token() else {
            self.set_state(CredentialState::NoToken);
            self.finish_pass(was_valid, false);
            return CredentialState::NoToken;
        };

        self.set_state(CredentialState::Validating);
        match self.refresh_and_identify(token, now).await {
            Ok(Some(user)) if !user.login.trim().is_empty() => {
                if self.username().as_deref() != Some(user.login.as_str()) {
                    self.config.update(|c| c.twitch_username = Some(user.login.clone()));
                    self.config.persist();
                }
                self.set_state(CredentialState::Valid);
                self.finish_pass(was_valid, true);
            }
            Ok(_) => {
                warn!("(CredentialManager) token has no identity; marking invalid");
                self.set_state(CredentialState::Invalid);
                self.finish_pass(was_valid, false);
            }
            Err(e) => {
                warn!("(CredentialManager) validation failed => {e}");
                if was_valid {
                    info!("(CredentialManager) previously valid credentials no longer work; clearing");
                    self.clear();
                } else {
                    self.set_state(CredentialState::Invalid);
                }
                self.finish_pass(was_valid, false);
            }
        }
        self.state()
    }

    async fn refresh_and_identify(
        &self,
        mut token: AccessToken,
        now: DateTime<Utc>,
    ) -> Result<Option<TwitchUser>, Error> {
        if token.can_refresh() && token.expires_within(now, Duration::hours(REFRESH_LOOKAHEAD_HOURS)) {
            debug!("(CredentialManager) token expires soon; refreshing");
            match self.api.refresh_token(&token).await {
                Ok(refreshed) => {
                    self.config.update(|c| c.oauth = Some(refreshed.clone()));
                    self.config.persist();
                    token = refreshed;
                }
                // the current token may still have time left; let validation decide
                Err(e) => warn!("(CredentialManager) refresh failed => {e}; validating current token"),
            }
        }
        self.api.get_user(&token).await
    }

    fn clear(&self) {
        self.config.update(|c| {
            c.oauth = None;
            c.twitch_username = None;
        });
        self.config.persist();
        self.set_state(CredentialState::NoToken);
        self.valid.store(false, Ordering::SeqCst);
        self.bus.publish(AppEvent::CredentialsChanged(None));
    }

    /// Publishes a status change only when the flag actually flips.
    fn finish_pass(&self, was_valid: bool, now_valid: bool) {
        self.valid.store(now_valid, Ordering::SeqCst);
        if was_valid != now_valid {
            self.bus.publish(AppEvent::CredentialsStatusChanged(now_valid));
        }
    }

    fn set_state(&self, state: CredentialState) {
        *self.state.lock() = state;
    }
}
