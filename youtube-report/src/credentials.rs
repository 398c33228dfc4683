//! How outgoing API requests prove who they are.
//!
//! [`YouTubeClient`](crate::youtube_api::YouTubeClient) is generic over [`Credentials`], so the
//! pipeline never has to know whether it runs with an API key or on behalf of a signed-in user.

use crate::oauth::OAuthManager;
use eyre::Context;
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use reqwest::RequestBuilder;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::instrument;

/// Something that can authorize a request to the YouTube APIs.
pub trait Credentials: Send + Sync {
    /// Attaches whatever the API needs to accept `request`.
    fn authorize(
        &self,
        request: RequestBuilder,
    ) -> impl Future<Output = eyre::Result<RequestBuilder>> + Send;
}

/// A static developer key, sent as the `key` query parameter.
///
/// Only public data is reachable this way; YouTube Analytics always needs [`OAuthToken`].
#[derive(Clone)]
pub struct ApiKey {
    key: String,
}

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey").finish_non_exhaustive()
    }
}

impl Credentials for ApiKey {
    fn authorize(
        &self,
        request: RequestBuilder,
    ) -> impl Future<Output = eyre::Result<RequestBuilder>> + Send {
        let request = request.query(&[("key", self.key.as_str())]);
        async move { Ok(request) }
    }
}

/// An OAuth access token along with the moment we stop trusting it.
#[derive(Debug, Clone)]
pub struct TimeBoundAccessToken {
    token: BasicTokenResponse,
    /// When the access token expires, minus a safety margin.
    expires_at: SystemTime,
}

impl TimeBoundAccessToken {
    /// Wraps a token whose age is unknown, such as one loaded from disk, so that it gets
    /// refreshed before first use.
    pub fn expired(token: BasicTokenResponse) -> Self {
        Self {
            expires_at: SystemTime::UNIX_EPOCH,
            token,
        }
    }

    /// Wraps a token that was just issued.
    pub fn new(token: BasicTokenResponse) -> Self {
        Self {
            expires_at: Self::calculate_token_expiry(&token),
            token,
        }
    }

    pub fn raw_token(&self) -> &BasicTokenResponse {
        &self.token
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    /// Replaces the access token with a refreshed one, keeping the refresh token.
    ///
    /// Returns `Ok(false)` if Google refused the refresh.
    pub async fn refresh(&mut self, oauth_manager: &OAuthManager) -> eyre::Result<bool> {
        tracing::trace!("refreshing token");
        let Some(new_token) = oauth_manager
            .refresh_token(&self.token)
            .await
            .context("refresh OAuth token")?
        else {
            return Ok(false);
        };

        let old_token = std::mem::replace(&mut self.token, new_token);
        // Google only sometimes rotates the refresh token
        if self.token.refresh_token().is_none() {
            tracing::trace!("new token lacks refresh token, preserving original");
            self.token
                .set_refresh_token(old_token.refresh_token().cloned());
        }
        self.expires_at = Self::calculate_token_expiry(&self.token);
        Ok(true)
    }

    /// `expires_in` minus five minutes, or 55 minutes if the server did not say.
    fn calculate_token_expiry(token: &BasicTokenResponse) -> SystemTime {
        let now = SystemTime::now();
        match token.expires_in() {
            Some(expires_in) => (now + expires_in)
                .checked_sub(Duration::from_secs(300))
                .unwrap_or(now),
            None => now + Duration::from_secs(3300),
        }
    }
}

/// Acts on behalf of the signed-in channel owner.
#[derive(Debug)]
pub struct OAuthToken {
    token: Mutex<TimeBoundAccessToken>,
    oauth_manager: OAuthManager,
}

impl OAuthToken {
    pub fn new(token: TimeBoundAccessToken, oauth_manager: OAuthManager) -> Self {
        Self {
            token: Mutex::new(token),
            oauth_manager,
        }
    }

    /// Produces a usable token, preferring the one cached at `cache`.
    ///
    /// A cached token is refreshed straight away. If there is no cache, or Google rejects the
    /// cached refresh token, the user is sent through the consent flow. Either way the resulting
    /// token is written back to `cache` for the next run.
    #[instrument(skip(oauth_manager))]
    pub async fn acquire(oauth_manager: OAuthManager, cache: &Path) -> eyre::Result<Self> {
        let token = match load_cached(&oauth_manager, cache).await? {
            Some(token) => token,
            None => TimeBoundAccessToken::new(
                oauth_manager
                    .authenticate()
                    .await
                    .context("authorize user to YouTube")?,
            ),
        };
        save_token(cache, token.raw_token()).await?;
        Ok(Self::new(token, oauth_manager))
    }

    /// The current access token, refreshed first if it is about to expire.
    async fn fresh_access_token(&self) -> eyre::Result<String> {
        let mut token = self.token.lock().await;
        if token.is_expired() {
            tracing::debug!("access token expired, attempting refresh");
            if !token.refresh(&self.oauth_manager).await? {
                eyre::bail!("unable to refresh expired access token");
            }
        }
        Ok(token.token.access_token().secret().to_string())
    }
}

impl Credentials for OAuthToken {
    fn authorize(
        &self,
        request: RequestBuilder,
    ) -> impl Future<Output = eyre::Result<RequestBuilder>> + Send {
        async move {
            let access_token = self.fresh_access_token().await?;
            Ok(request.bearer_auth(access_token))
        }
    }
}

/// Reads the token cached at `cache` and refreshes it.
///
/// `Ok(None)` means the consent flow has to run: either nothing is cached or the cached refresh
/// token was rejected. A cache that exists but cannot be read or parsed is an error.
async fn load_cached(
    oauth_manager: &OAuthManager,
    cache: &Path,
) -> eyre::Result<Option<TimeBoundAccessToken>> {
    let raw = match tokio::fs::read_to_string(cache).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("no cached token, starting OAuth flow");
            return Ok(None);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("read cached OAuth token {}", cache.display()));
        }
    };
    let token = serde_json::from_str::<BasicTokenResponse>(&raw)
        .with_context(|| format!("parse cached OAuth token {}", cache.display()))?;

    let mut token = TimeBoundAccessToken::expired(token);
    if token
        .refresh(oauth_manager)
        .await
        .context("refresh cached token")?
    {
        tracing::debug!("refreshed cached token");
        Ok(Some(token))
    } else {
        tracing::warn!("cached token was rejected, starting a new OAuth flow");
        Ok(None)
    }
}

/// Writes `token` to `cache`. On unix the file is readable by the current user only.
async fn save_token(cache: &Path, token: &BasicTokenResponse) -> eyre::Result<()> {
    let json = serde_json::to_string(token).context("serialize OAuth token")?;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options
        .open(cache)
        .await
        .with_context(|| format!("create OAuth token cache {}", cache.display()))?;
    // `mode` only applies when the file is created
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await
            .with_context(|| format!("restrict permissions of {}", cache.display()))?;
    }
    file.write_all(json.as_bytes())
        .await
        .with_context(|| format!("cache OAuth token in {}", cache.display()))?;
    file.flush()
        .await
        .with_context(|| format!("cache OAuth token in {}", cache.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oauth2::basic::BasicTokenType;
    use oauth2::{AccessToken, EmptyExtraTokenFields, RefreshToken};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token(expires_in: Option<u64>) -> BasicTokenResponse {
        let mut token = BasicTokenResponse::new(
            AccessToken::new("ya29.access".to_string()),
            BasicTokenType::Bearer,
            EmptyExtraTokenFields {},
        );
        token.set_expires_in(expires_in.map(Duration::from_secs).as_ref());
        token.set_refresh_token(Some(RefreshToken::new("1//refresh".to_string())));
        token
    }

    #[test]
    fn loaded_tokens_start_expired() {
        assert!(TimeBoundAccessToken::expired(token(Some(3600))).is_expired());
    }

    #[test]
    fn fresh_tokens_are_usable() {
        assert!(!TimeBoundAccessToken::new(token(Some(3600))).is_expired());
        assert!(!TimeBoundAccessToken::new(token(None)).is_expired());
    }

    #[test]
    fn short_lived_tokens_count_as_expired() {
        assert!(TimeBoundAccessToken::new(token(Some(60))).is_expired());
    }

    #[tokio::test]
    async fn oauth_token_sets_bearer_header() {
        let creds = OAuthToken::new(
            TimeBoundAccessToken::new(token(Some(3600))),
            OAuthManager::new("id", "secret"),
        );
        let request = creds
            .authorize(reqwest::Client::new().get("http://localhost/videos"))
            .await
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers()[reqwest::header::AUTHORIZATION],
            "Bearer ya29.access"
        );
    }

    #[tokio::test]
    async fn api_key_is_a_query_parameter() {
        let request = ApiKey::new("AIza-key")
            .authorize(reqwest::Client::new().get("http://localhost/videos?part=snippet"))
            .await
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.url().query(), Some("part=snippet&key=AIza-key"));
    }

    fn manager(server: &MockServer) -> OAuthManager {
        OAuthManager::new("id", "secret").with_token_url(format!("{}/token", server.uri()))
    }

    async fn cache_with(
        dir: &tempfile::TempDir,
        token: &BasicTokenResponse,
    ) -> std::path::PathBuf {
        let cache = dir.path().join("token.json");
        tokio::fs::write(&cache, serde_json::to_string(token).unwrap())
            .await
            .unwrap();
        cache
    }

    #[tokio::test]
    async fn missing_cache_asks_for_consent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();

        let loaded = load_cached(&manager(&server), &dir.path().join("token.json"))
            .await
            .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn unreadable_cache_is_an_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("token.json");
        tokio::fs::write(&cache, "not json").await.unwrap();

        let err = load_cached(&manager(&server), &cache).await.unwrap_err();
        assert!(format!("{err:?}").contains("parse cached OAuth token"), "{err:?}");
    }

    #[tokio::test]
    async fn cached_token_is_refreshed_and_keeps_its_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.new",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(&dir, &token(Some(3600))).await;

        let loaded = load_cached(&manager(&server), &cache)
            .await
            .unwrap()
            .expect("refresh succeeded");
        assert!(!loaded.is_expired());
        assert_eq!(loaded.raw_token().access_token().secret(), "ya29.new");
        assert_eq!(
            loaded.raw_token().refresh_token().map(|t| t.secret().as_str()),
            Some("1//refresh")
        );
    }

    #[tokio::test]
    async fn rejected_refresh_falls_back_to_consent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .expect(1)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(&dir, &token(Some(3600))).await;

        let loaded = load_cached(&manager(&server), &cache).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn other_refresh_failures_are_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(&dir, &token(Some(3600))).await;

        assert!(load_cached(&manager(&server), &cache).await.is_err());
    }

    #[tokio::test]
    async fn saved_token_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("token.json");
        save_token(&cache, &token(Some(3600))).await.unwrap();

        let raw = tokio::fs::read_to_string(&cache).await.unwrap();
        let saved: BasicTokenResponse = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved.access_token().secret(), "ya29.access");
        assert_eq!(
            saved.refresh_token().map(|t| t.secret().as_str()),
            Some("1//refresh")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn saved_token_is_private_to_the_user() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("token.json");
        // an existing world-readable cache gets tightened as well
        tokio::fs::write(&cache, "{}").await.unwrap();
        tokio::fs::set_permissions(&cache, std::fs::Permissions::from_mode(0o644))
            .await
            .unwrap();

        save_token(&cache, &token(Some(3600))).await.unwrap();

        let mode = tokio::fs::metadata(&cache)
            .await
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
