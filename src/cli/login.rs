use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use std::io;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::Session;
use crate::api::models::{TokenPoll, User};
use crate::api::ApiClient;
use crate::config::Credential;

const POLL_INTERVAL: Duration = Duration::from_secs(3);
const POLL_ATTEMPTS: u32 = 100;

/// Opens the login page for the user
pub trait AuthLauncher {
    fn open(&self, url: &str) -> io::Result<()>;
}

/// Opens the login page in the default browser
#[derive(Debug, Default)]
pub struct BrowserLauncher;

impl AuthLauncher for BrowserLauncher {
    fn open(&self, url: &str) -> io::Result<()> {
        webbrowser::open(url)
    }
}

/// Produces the one-time key that ties the browser session to this CLI
pub trait KeyGenerator {
    fn generate(&self) -> String;
}

#[derive(Debug, Default)]
pub struct UuidKeyGenerator;

impl KeyGenerator for UuidKeyGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Browser login: open the login page with a fresh key, then poll the
/// backend until the browser side hands out a token
pub struct LoginFlow<'a> {
    api: &'a ApiClient,
    launcher: &'a dyn AuthLauncher,
    keys: &'a dyn KeyGenerator,
    interval: Duration,
    max_attempts: u32,
}

impl<'a> LoginFlow<'a> {
    pub fn new(
        api: &'a ApiClient,
        launcher: &'a dyn AuthLauncher,
        keys: &'a dyn KeyGenerator,
    ) -> Self {
        Self {
            api,
            launcher,
            keys,
            interval: POLL_INTERVAL,
            max_attempts: POLL_ATTEMPTS,
        }
    }

    pub fn with_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.interval = interval;
        self.max_attempts = max_attempts;
        self
    }

    /// Returns the issued token
    pub async fn run(&self) -> Result<String> {
        let key = self.keys.generate();
        let login_url = format!(
            "{}/user/login?key={}",
            self.api.base_url(),
            urlencoding::encode(&key)
        );

        println!("Opening the login page in your browser.");
        println!("If it does not open, visit this URL manually:\n\n  {}\n", login_url);
        if let Err(e) = self.launcher.open(&login_url) {
            warn!("Failed to open browser: {}", e);
        }

        self.poll(&key).await
    }

    async fn poll(&self, key: &str) -> Result<String> {
        let path = format!("/user/login/get-token?key={}", urlencoding::encode(key));

        for attempt in 1..=self.max_attempts {
            let poll: TokenPoll = self
                .api
                .get(&path)
                .await
                .context("Failed to check login status")?;

            match poll.status.as_str() {
                "success" => match poll.token {
                    Some(token) if !token.is_empty() => {
                        debug!(attempt, "Login completed");
                        return Ok(token);
                    }
                    _ => bail!("Login succeeded but the backend returned no token"),
                },
                "pending" => {
                    debug!(attempt, "Login still pending");
                }
                other => bail!("Login failed: unexpected status '{}'", other),
            }

            if attempt < self.max_attempts {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => bail!("Login aborted"),
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
        }

        bail!(
            "Timed out waiting for login after {} attempts. Please try again.",
            self.max_attempts
        )
    }
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

/// Expiry of a JWT, read from its `exp` claim.
///
/// The signature is not checked; the backend that issued the token is the
/// one that validates it.
pub fn token_expiry(token: &str) -> Result<DateTime<Utc>> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let data = decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .context("Failed to decode login token")?;

    Utc.timestamp_opt(data.claims.exp, 0)
        .single()
        .context("Login token has an invalid expiry")
}

/// Human readable expiry, e.g. `2026-10-19 12:00:00 UTC (in 23h 59m)`
pub fn format_token_expiration(expiry: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let stamp = expiry.format("%Y-%m-%d %H:%M:%S UTC");
    let remaining = expiry - now;
    if remaining.num_seconds() <= 0 {
        return format!("{} (expired)", stamp);
    }

    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    let minutes = remaining.num_minutes() % 60;
    if days > 0 {
        format!("{} (in {}d {}h)", stamp, days, hours)
    } else if hours > 0 {
        format!("{} (in {}h {}m)", stamp, hours, minutes)
    } else {
        format!("{} (in {}m)", stamp, minutes.max(1))
    }
}

/// Turn an issued token into a stored credential
async fn store_token(session: &mut Session, token: String) -> Result<Credential> {
    let expiry = token_expiry(&token)?;
    session.api.set_token(token.clone());

    let user: User = session
        .api
        .get("/user")
        .await
        .context("Failed to fetch the logged in user")?;

    let credential = Credential {
        token,
        expiry: Some(expiry),
        id: user.id,
        name: user.name,
    };
    session.config.set_credential(credential.clone());
    session.config.save_or_warn();

    Ok(credential)
}

pub async fn handle_login(session: &mut Session, url: Option<String>) -> Result<()> {
    if let Some(url) = url {
        let url = url.trim_end_matches('/').to_string();
        info!("Using backend {}", url);
        session.config.backend_url = Some(url.clone());
        session.api = ApiClient::new(url);
    }

    login_with(session, &BrowserLauncher, &UuidKeyGenerator, None).await
}

async fn login_with(
    session: &mut Session,
    launcher: &dyn AuthLauncher,
    keys: &dyn KeyGenerator,
    polling: Option<(Duration, u32)>,
) -> Result<()> {
    let mut flow = LoginFlow::new(&session.api, launcher, keys);
    if let Some((interval, attempts)) = polling {
        flow = flow.with_polling(interval, attempts);
    }
    let token = flow.run().await?;

    let credential = store_token(session, token).await?;
    info!(user_id = %credential.id, "Logged in");

    println!("✓ Logged in as {}", credential.name);
    if let Some(expiry) = credential.expiry {
        println!(
            "  Token expires: {}",
            format_token_expiration(expiry, Utc::now())
        );
    }
    Ok(())
}

pub fn handle_logout(session: &mut Session) -> Result<()> {
    if session.config.credential.token.is_empty() {
        println!("Not logged in.");
        return Ok(());
    }

    session.config.clear_credential();
    session.config.save_or_warn();
    println!("✓ Logged out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::testing;
    use httpmock::prelude::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::cell::RefCell;

    struct FixedKey;

    impl KeyGenerator for FixedKey {
        fn generate(&self) -> String {
            "k-123".to_string()
        }
    }

    #[derive(Default)]
    struct RecordingLauncher {
        opened: RefCell<Vec<String>>,
    }

    impl AuthLauncher for RecordingLauncher {
        fn open(&self, url: &str) -> io::Result<()> {
            self.opened.borrow_mut().push(url.to_string());
            Ok(())
        }
    }

    fn jwt(exp: i64) -> String {
        encode(
            &Header::default(),
            &json!({ "sub": "u-1", "exp": exp }),
            &EncodingKey::from_secret(b"backend-secret"),
        )
        .unwrap()
    }

    const FAST: Option<(Duration, u32)> = Some((Duration::from_millis(5), 5));

    #[test]
    fn test_token_expiry_reads_exp_claim() {
        let expiry = token_expiry(&jwt(1_900_000_000)).unwrap();
        assert_eq!(expiry.timestamp(), 1_900_000_000);
    }

    #[test]
    fn test_token_expiry_rejects_garbage() {
        assert!(token_expiry("not-a-jwt").is_err());
    }

    #[test]
    fn test_format_token_expiration() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let expiry = now + chrono::Duration::hours(5) + chrono::Duration::minutes(30);
        assert_eq!(
            format_token_expiration(expiry, now),
            "2026-01-01 05:30:00 UTC (in 5h 30m)"
        );

        let expiry = now + chrono::Duration::days(2) + chrono::Duration::hours(3);
        assert!(format_token_expiration(expiry, now).ends_with("(in 2d 3h)"));

        let expiry = now - chrono::Duration::minutes(1);
        assert!(format_token_expiration(expiry, now).ends_with("(expired)"));
    }

    #[tokio::test]
    async fn test_login_polls_until_success_and_stores_credential() {
        let server = MockServer::start();
        let token = jwt(1_900_000_000);
        let mut pending = server.mock(|when, then| {
            when.method(GET)
                .path("/user/login/get-token")
                .query_param("key", "k-123");
            then.status(200)
                .json_body(json!({ "data": { "status": "pending" } }));
        });

        let temp_dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&server, &temp_dir, Vec::<String>::new());
        session.config.clear_credential();
        session.api = ApiClient::new(server.base_url());
        let launcher = RecordingLauncher::default();

        let err = LoginFlow::new(&session.api, &RecordingLauncher::default(), &FixedKey)
            .with_polling(Duration::from_millis(5), 3)
            .run()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Timed out"));
        assert_eq!(pending.calls(), 3);
        pending.delete();

        server.mock(|when, then| {
            when.method(GET)
                .path("/user/login/get-token")
                .query_param("key", "k-123");
            then.status(200).json_body(json!({
                "data": { "status": "success", "token": token }
            }));
        });
        let user = server.mock(|when, then| {
            when.method(GET)
                .path("/user")
                .header("authorization", format!("Bearer {}", token));
            then.status(200).json_body(json!({
                "data": { "id": "u-7", "name": "Grace", "email": "grace@acme.dev" }
            }));
        });

        login_with(&mut session, &launcher, &FixedKey, FAST)
            .await
            .unwrap();

        assert_eq!(user.calls(), 1);
        assert_eq!(
            launcher.opened.borrow().as_slice(),
            [format!("{}/user/login?key=k-123", server.base_url())]
        );

        let stored = crate::config::Config::load_from(session.config.path().unwrap()).unwrap();
        assert_eq!(stored.credential.token, token);
        assert_eq!(stored.credential.id, "u-7");
        assert_eq!(stored.credential.name, "Grace");
        assert_eq!(stored.credential.expiry.unwrap().timestamp(), 1_900_000_000);
    }

    #[tokio::test]
    async fn test_login_fails_on_unknown_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/user/login/get-token");
            then.status(200)
                .json_body(json!({ "data": { "status": "denied" } }));
        });

        let api = ApiClient::new(server.base_url());
        let err = LoginFlow::new(&api, &RecordingLauncher::default(), &FixedKey)
            .with_polling(Duration::from_millis(5), 5)
            .run()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("denied"));
    }

    #[tokio::test]
    async fn test_login_succeeds_when_config_cannot_be_written() {
        let server = MockServer::start();
        let token = jwt(1_900_000_000);
        server.mock(|when, then| {
            when.method(GET).path("/user/login/get-token");
            then.status(200).json_body(json!({
                "data": { "status": "success", "token": token }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/user");
            then.status(200).json_body(json!({
                "data": { "id": "u-7", "name": "Grace", "email": "grace@acme.dev" }
            }));
        });

        let temp_dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&server, &temp_dir, Vec::<String>::new());
        session.config.clear_credential();
        session.api = ApiClient::new(server.base_url());
        // A directory where the config file should be makes every save fail
        std::fs::create_dir_all(session.config.path().unwrap()).unwrap();

        login_with(&mut session, &RecordingLauncher::default(), &FixedKey, FAST)
            .await
            .unwrap();
        assert_eq!(session.config.credential.id, "u-7");
    }

    #[test]
    fn test_logout_succeeds_when_config_cannot_be_written() {
        let server = MockServer::start();
        let temp_dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&server, &temp_dir, Vec::<String>::new());
        std::fs::create_dir_all(session.config.path().unwrap()).unwrap();

        handle_logout(&mut session).unwrap();
        assert!(session.config.credential.token.is_empty());
    }

    #[test]
    fn test_logout_clears_credential() {
        let server = MockServer::start();
        let temp_dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&server, &temp_dir, Vec::<String>::new());

        handle_logout(&mut session).unwrap();

        let stored = crate::config::Config::load_from(session.config.path().unwrap()).unwrap();
        assert!(stored.credential.token.is_empty());
        assert_eq!(stored.organization_id, "o-1");
    }
}
