use anyhow::{anyhow, Context};
use futures_core::future::BoxFuture;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const OPENAI_CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";
const OPENAI_TOKEN_URL: &str = "https://auth.openai.com/oauth/token";

/// Refresh when the token expires within this window.
const REFRESH_SKEW: Duration = Duration::from_secs(30);

/// Backend credentials, also the on-disk token file format.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub account_id: String,
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Seconds since UNIX epoch.
    #[serde(default)]
    pub expires_at: Option<u64>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            account_id: account_id.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn is_valid_for(&self, skew: Duration) -> bool {
        let Some(exp) = self.expires_at else {
            // No expiry? Treat as valid.
            return true;
        };
        now_secs().saturating_add(skew.as_secs()) < exp
    }
}

/// Supplies credentials once per call. May suspend (e.g. on refresh).
pub trait CredentialSource: Send + Sync {
    fn credentials(&self) -> BoxFuture<'_, anyhow::Result<Credentials>>;
}

#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl CredentialSource for StaticCredentials {
    fn credentials(&self) -> BoxFuture<'_, anyhow::Result<Credentials>> {
        let creds = self.0.clone();
        Box::pin(async move { Ok(creds) })
    }
}

#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub token_url: Url,
}

impl OAuthClient {
    pub fn openai() -> anyhow::Result<Self> {
        Ok(Self {
            client_id: OPENAI_CLIENT_ID.to_string(),
            token_url: Url::parse(OPENAI_TOKEN_URL)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TokenSuccessResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Reads the token file written by the Codex sign-in flow.
///
/// With `auto_refresh`, an expiring token is refreshed once and written back.
#[derive(Debug, Clone)]
pub struct FileCredentialSource {
    /// `None` resolves to [`crate::paths::default_credentials_path`] per call.
    path: Option<PathBuf>,
    auto_refresh: bool,
    http: reqwest::Client,
    oauth: OAuthClient,
}

impl FileCredentialSource {
    pub fn new(path: Option<PathBuf>, auto_refresh: bool, http: reqwest::Client) -> anyhow::Result<Self> {
        Ok(Self {
            path,
            auto_refresh,
            http,
            oauth: OAuthClient::openai()?,
        })
    }

    pub fn with_oauth_client(mut self, oauth: OAuthClient) -> Self {
        self.oauth = oauth;
        self
    }

    async fn load(&self) -> anyhow::Result<Credentials> {
        let path = match &self.path {
            Some(p) => p.clone(),
            None => crate::paths::default_credentials_path()?,
        };

        let Some(creds) = load_token(&path)? else {
            anyhow::bail!(
                "no Codex credentials found at {}; sign in with the Codex CLI first",
                path.display()
            );
        };

        if !self.auto_refresh || creds.is_valid_for(REFRESH_SKEW) {
            return Ok(creds);
        }

        tracing::debug!(path = %path.display(), "access token expiring; refreshing");
        let refreshed = refresh_token(&self.http, &self.oauth, creds).await?;
        save_token_atomic(&path, &refreshed)?;
        Ok(refreshed)
    }
}

impl CredentialSource for FileCredentialSource {
    fn credentials(&self) -> BoxFuture<'_, anyhow::Result<Credentials>> {
        Box::pin(self.load())
    }
}

pub async fn refresh_token(
    http: &reqwest::Client,
    oauth: &OAuthClient,
    creds: Credentials,
) -> anyhow::Result<Credentials> {
    let Some(refresh_token) = creds.refresh_token.clone() else {
        return Err(anyhow!(
            "access token expired and no refresh_token is available; sign in again"
        ));
    };

    let form: Vec<(&str, String)> = vec![
        ("client_id", oauth.client_id.clone()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token".to_string()),
    ];

    let resp = http
        .post(oauth.token_url.clone())
        .form(&form)
        .send()
        .await
        .context("failed to refresh token")?;

    let status = resp.status();
    let body = resp.bytes().await.context("failed to read refresh response")?;
    if !status.is_success() {
        let msg = String::from_utf8_lossy(&body);
        return Err(anyhow!("refresh failed: HTTP {status}: {msg}"));
    }

    let ok: TokenSuccessResponse =
        serde_json::from_slice(&body).context("failed to parse refresh token JSON")?;

    Ok(Credentials {
        access_token: ok.access_token,
        account_id: creds.account_id,
        // Keep the old refresh token when the server does not rotate it.
        refresh_token: ok.refresh_token.or(creds.refresh_token),
        expires_at: ok.expires_in.map(|s| now_secs().saturating_add(s)),
    })
}

pub fn load_token(path: impl AsRef<Path>) -> anyhow::Result<Option<Credentials>> {
    let path = path.as_ref();
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(anyhow!(e)).with_context(|| format!("failed to read token: {}", path.display()))
        }
    };
    let creds: Credentials = serde_json::from_slice(&bytes).context("failed to parse token JSON")?;
    Ok(Some(creds))
}

pub fn save_token_atomic(path: impl AsRef<Path>, creds: &Credentials) -> anyhow::Result<()> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create token directory: {}", dir.display()))?;

    let tmp = tmp_path(path);
    let bytes = serde_json::to_vec_pretty(creds).context("failed to serialize token")?;
    std::fs::write(&tmp, bytes).with_context(|| format!("failed to write temp token: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move token into place: {}", path.display()))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let file = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "auth.json".to_string());
    p.set_file_name(format!("{file}.tmp"));
    p
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}
