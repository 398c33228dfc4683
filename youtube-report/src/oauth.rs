//! OAuth 2.0 consent and refresh flows against Google's authorization server.
//!
//! The interactive flow opens the user's browser on Google's consent page and receives the
//! authorization code on a one-shot HTTP listener bound to a random loopback port.

use eyre::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, RedirectUrl,
    Scope, TokenResponse, TokenUrl, reqwest,
};
use serde::Deserialize;
use std::future::Future;
use std::path::Path;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Used for both the initial code exchange and later refreshes.
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Read access to the channel's videos plus its analytics reports.
const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/youtube.readonly",
    "https://www.googleapis.com/auth/yt-analytics.readonly",
];

const OAUTH_DONE_HTML: &str = "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>youtube-report</title></head>\
<body><p>Authorization complete. You can close this tab and return to the terminal.</p></body></html>";

/// The client secret file offered for download by the Google Cloud console.
///
/// Desktop clients are nested under `installed`, web clients under `web`.
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    #[serde(alias = "web")]
    installed: ClientSecretEntry,
}

#[derive(Debug, Deserialize)]
struct ClientSecretEntry {
    client_id: String,
    client_secret: String,
}

/// Runs OAuth flows for one registered Google API client.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    client_id: String,
    client_secret: String,
    token_url: String,
}

impl OAuthManager {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: TOKEN_URL.to_string(),
        }
    }

    /// Exchanges codes and refresh tokens at `token_url` instead of Google's endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    fn token_uri(&self) -> eyre::Result<TokenUrl> {
        TokenUrl::new(self.token_url.clone()).context("parse token URL")
    }

    /// Reads the client id and secret from a Google client secret JSON file.
    pub async fn from_client_secret_file(path: &Path) -> eyre::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read OAuth client secret file {}", path.display()))?;
        Self::from_client_secret_json(&raw)
            .with_context(|| format!("parse OAuth client secret file {}", path.display()))
    }

    fn from_client_secret_json(raw: &str) -> eyre::Result<Self> {
        let file: ClientSecretFile = serde_json::from_str(raw)?;
        Ok(Self::new(
            file.installed.client_id,
            file.installed.client_secret,
        ))
    }

    fn http_client() -> eyre::Result<reqwest::Client> {
        reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build OAuth HTTP client")
    }

    /// Walks the user through the consent screen and exchanges the resulting code for a token.
    pub async fn authenticate(&self) -> eyre::Result<BasicTokenResponse> {
        let csrf = CsrfToken::new_random();
        let (redirect_url, eventually_authorization_code) = self
            .setup_redirect(csrf.clone())
            .await
            .context("set up redirect endpoint")?;

        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(AUTH_URL.to_string()).context("parse auth URL")?)
            .set_token_uri(self.token_uri()?)
            .set_redirect_uri(redirect_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, _csrf_token) = client
            // The flow runs exactly once, so the CSRF token is never re-used.
            .authorize_url(move || csrf.clone())
            .add_scopes(SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .set_pkce_challenge(pkce_challenge)
            .url();

        tracing::info!(url = %auth_url, "asking user to follow OAuth flow");
        if let Err(e) = webbrowser::open(auth_url.as_ref()) {
            // headless machines can still copy the URL from the log line above
            tracing::warn!("could not open browser: {e}");
        }
        let authorization_code = eventually_authorization_code
            .await
            .context("await user authorization code")?;

        let token = client
            .exchange_code(authorization_code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&Self::http_client()?)
            .await
            .context("exchange authorization code for access token")?;

        Ok(token)
    }

    /// Exchanges the refresh token held by `token` for a new access token.
    ///
    /// Returns `Ok(None)` when there is no refresh token or Google no longer honors it, in which
    /// case the caller has to go through [`Self::authenticate`] again.
    pub async fn refresh_token(
        &self,
        token: &BasicTokenResponse,
    ) -> eyre::Result<Option<BasicTokenResponse>> {
        let Some(refresh_token) = token.refresh_token() else {
            tracing::warn!("no refresh token available, cannot refresh");
            return Ok(None);
        };

        tracing::debug!("attempting to refresh OAuth token");
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_token_uri(self.token_uri()?);

        match client
            .exchange_refresh_token(refresh_token)
            .request_async(&Self::http_client()?)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(Some(new_token))
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(
                    sr.error(),
                    oauth2::basic::BasicErrorResponseType::InvalidGrant
                ) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }

    /// Binds the loopback listener that Google redirects the browser to.
    ///
    /// Returns the redirect URL to register with the authorization request, and a future that
    /// resolves once a request with a matching `state` and a `code` has arrived.
    async fn setup_redirect(
        &self,
        csrf: CsrfToken,
    ) -> eyre::Result<(
        RedirectUrl,
        impl Future<Output = eyre::Result<AuthorizationCode>>,
    )> {
        let socket = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind to localhost")?;
        let addr = socket.local_addr().context("get local address")?;
        let url = RedirectUrl::new(format!("http://{}:{}", addr.ip(), addr.port()))
            .context("construct redirect url")?;
        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let r = async move {
                let (conn, _) = socket.accept().await.context("accept")?;
                let conn = hyper_util::rt::TokioIo::new(conn);
                let (got, mut gotten) = tokio::sync::mpsc::channel(1);
                let service = service_fn(move |req: Request<body::Incoming>| {
                    let csrf = csrf.clone();
                    let got = got.clone();
                    async move {
                        let mut state = None;
                        let mut code = None;
                        for (k, v) in
                            form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
                        {
                            match &*k {
                                "state" => state = Some(v),
                                "code" => code = Some(v),
                                _ => {}
                            }
                        }
                        if state.as_deref() != Some(csrf.secret().as_str()) {
                            return Err("invalid csrf token");
                        }
                        let Some(code) = code else {
                            return Err("no authorization code found");
                        };
                        got.send(AuthorizationCode::new(code.into_owned()))
                            .await
                            .map_err(|_| "authorization code receiver went away")?;
                        Ok(Response::new(Full::<Bytes>::from(OAUTH_DONE_HTML)))
                    }
                });
                let mut serve = std::pin::pin!(
                    hyper::server::conn::http1::Builder::new().serve_connection(conn, service)
                );

                tokio::select! {
                    exit = &mut serve => {
                        match exit {
                            Err(e) => Err(e).context("redirect server got bad request"),
                            Ok(()) => eyre::bail!("redirect server exit prematurely"),
                        }
                    }
                    code = gotten.recv() => {
                        serve.as_mut().graceful_shutdown();
                        code.ok_or_else(|| eyre::eyre!("redirect handler exited without a code"))
                    }
                }
            };
            let _ = tx.send(r.await);
        });
        Ok((url, async move {
            rx.await.context("redirect future dropped prematurely")?
        }))
    }
}
