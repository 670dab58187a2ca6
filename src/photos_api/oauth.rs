//! OAuth2 authorization-code flow with a loopback redirect listener.
//!
//! Client credentials and issued tokens live as JSON files in the data
//! directory:
//!
//! ```text
//! <data_dir>/google-credentials.json   {"clientId", "clientSecret", "redirectUri"}
//! <data_dir>/google-tokens.json        {"access_token", "refresh_token", ...}
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::GooglePhotosConfig;
use crate::error::{Error, Result};

pub const CREDENTIALS_FILE: &str = "google-credentials.json";
pub const TOKENS_FILE: &str = "google-tokens.json";
pub const SCOPE: &str = "https://www.googleapis.com/auth/photoslibrary.readonly";
const CALLBACK_PATH: &str = "/oauth2callback";

/// Refresh this long before the recorded expiry.
const EXPIRY_MARGIN_MS: i64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: String,
}

impl Credentials {
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(CREDENTIALS_FILE)
    }

    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::path(data_dir);
        if !path.exists() {
            return Err(Error::Config(format!(
                "Google Photos credentials not configured. Create {} with format: \
                 {{\"clientId\": \"...\", \"clientSecret\": \"...\", \
                 \"redirectUri\": \"http://localhost:PORT/oauth2callback\"}}",
                path.display()
            )));
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Invalid credentials file {}: {}", path.display(), e))
        })
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        write_json(&Self::path(data_dir), self)
    }
}

/// Tokens as persisted between runs. `expiry_date` is in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

impl Tokens {
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(TOKENS_FILE)
    }

    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::path(data_dir);
        if !path.exists() {
            return Err(Error::Config(
                "Not authenticated with Google Photos. Run `shoebox auth` first.".to_string(),
            ));
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            warn!("Unreadable token file {}: {}", path.display(), e);
            Error::Config("Failed to load saved tokens. Please re-authenticate.".to_string())
        })
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        write_json(&Self::path(data_dir), self)
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expiry_date
            .map_or(false, |expiry| now_ms >= expiry - EXPIRY_MARGIN_MS)
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_tokens(self, now_ms: i64) -> Tokens {
        Tokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            scope: self.scope,
            token_type: self.token_type,
            expiry_date: self.expires_in.map(|secs| now_ms + secs * 1000),
        }
    }
}

/// Run the interactive authorization: listen on a loopback port, send the
/// user to the consent page, wait for the redirect and exchange the code.
/// Credentials (with the redirect actually used) and tokens are saved.
pub fn authorize(config: &GooglePhotosConfig, data_dir: &Path) -> Result<Tokens> {
    let credentials = Credentials::load(data_dir)?;

    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    let port = listener.local_addr()?.port();
    let redirect_uri = format!("http://localhost:{}{}", port, CALLBACK_PATH);
    let auth_url = build_auth_url(&config.auth_url, &credentials.client_id, &redirect_uri);

    info!("Authorize access to your photo library at: {}", auth_url);
    if config.open_browser {
        if let Err(e) = open_in_browser(&auth_url, config.browser_command.as_deref()) {
            warn!("Could not open browser: {}", e);
        }
    }

    let code = wait_for_code(&listener)?;
    debug!("Received authorization code");

    let tokens = exchange_code(config, &credentials, &code, &redirect_uri)?;

    let credentials = Credentials {
        redirect_uri,
        ..credentials
    };
    credentials.save(data_dir)?;
    tokens.save(data_dir)?;
    info!("Photo library authorization saved");
    Ok(tokens)
}

/// Exchange a refresh token for a new access token.
pub fn refresh(
    config: &GooglePhotosConfig,
    credentials: &Credentials,
    tokens: &Tokens,
) -> Result<Tokens> {
    let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
        Error::Config("Saved tokens expired and cannot be refreshed. Run `shoebox auth` again.".to_string())
    })?;

    let response = ureq::post(&config.token_url)
        .send_form(&[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .map_err(|e| Error::External(format!("Token refresh failed: {}", e)))?;

    let body: TokenResponse = response
        .into_json()
        .map_err(|e| Error::External(format!("Failed to parse token response: {}", e)))?;

    let mut refreshed = body.into_tokens(chrono::Utc::now().timestamp_millis());
    if refreshed.refresh_token.is_none() {
        refreshed.refresh_token = Some(refresh_token.to_string());
    }
    Ok(refreshed)
}

fn exchange_code(
    config: &GooglePhotosConfig,
    credentials: &Credentials,
    code: &str,
    redirect_uri: &str,
) -> Result<Tokens> {
    let response = ureq::post(&config.token_url)
        .send_form(&[
            ("code", code),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .map_err(|e| Error::External(format!("Token exchange failed: {}", e)))?;

    let body: TokenResponse = response
        .into_json()
        .map_err(|e| Error::External(format!("Failed to parse token response: {}", e)))?;

    Ok(body.into_tokens(chrono::Utc::now().timestamp_millis()))
}

pub fn build_auth_url(auth_url: &str, client_id: &str, redirect_uri: &str) -> String {
    let params = [
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("response_type", "code"),
        ("scope", SCOPE),
        ("access_type", "offline"),
        ("prompt", "consent"),
    ];
    let query: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect();
    format!("{}?{}", auth_url, query.join("&"))
}

#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code(String),
    Denied(String),
    Missing,
}

/// Interpret an HTTP request line. `None` means it was not the callback.
fn parse_callback(request_line: &str) -> Option<Callback> {
    let target = request_line.split_whitespace().nth(1)?;
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };
    if path != CALLBACK_PATH {
        return None;
    }

    let mut code = None;
    let mut error = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "code" if !value.is_empty() => code = Some(decode_query_value(value)),
            "error" => error = Some(decode_query_value(value)),
            _ => {}
        }
    }

    Some(match (code, error) {
        (Some(code), _) => Callback::Code(code),
        (None, Some(reason)) => Callback::Denied(reason),
        (None, None) => Callback::Missing,
    })
}

fn wait_for_code(listener: &TcpListener) -> Result<String> {
    for stream in listener.incoming() {
        let mut stream = stream?;
        let request_line = read_request_head(&stream)?;

        match parse_callback(&request_line) {
            None => {
                respond(&mut stream, "404 Not Found", "Not found.")?;
            }
            Some(Callback::Code(code)) => {
                respond(
                    &mut stream,
                    "200 OK",
                    "Authentication successful! You can close this window.",
                )?;
                return Ok(code);
            }
            Some(Callback::Denied(reason)) => {
                respond(&mut stream, "400 Bad Request", "Authentication failed.")?;
                return Err(Error::External(format!("Authorization denied: {}", reason)));
            }
            Some(Callback::Missing) => {
                respond(
                    &mut stream,
                    "400 Bad Request",
                    "Authentication failed. No code received.",
                )?;
                return Err(Error::External("No authorization code received".to_string()));
            }
        }
    }
    Err(Error::External("Callback listener closed".to_string()))
}

/// Read the request line and drain the headers.
fn read_request_head(stream: &TcpStream) -> Result<String> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let mut header = String::new();
    loop {
        header.clear();
        let read = reader.read_line(&mut header)?;
        if read == 0 || header == "\r\n" || header == "\n" {
            break;
        }
    }
    Ok(request_line)
}

fn respond(stream: &mut TcpStream, status: &str, message: &str) -> Result<()> {
    let body = format!("<html><body><h1>{}</h1></body></html>", message);
    write!(
        stream,
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )?;
    stream.flush()?;
    Ok(())
}

fn open_in_browser(url: &str, command: Option<&str>) -> std::io::Result<()> {
    if let Some(command) = command {
        std::process::Command::new(command).arg(url).spawn()?;
        return Ok(());
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn()?;
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Config(format!("Failed to serialize {}: {}", path.display(), e)))?;
    fs::write(path, content)?;
    Ok(())
}

/// Form-style query value: `+` is a space, then percent escapes.
fn decode_query_value(value: &str) -> String {
    let spaced = value.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_parse_callback() {
        assert_eq!(
            parse_callback("GET /oauth2callback?code=4%2F0Abc&scope=x HTTP/1.1\r\n"),
            Some(Callback::Code("4/0Abc".to_string()))
        );
        assert_eq!(
            parse_callback("GET /oauth2callback?error=access_denied HTTP/1.1"),
            Some(Callback::Denied("access_denied".to_string()))
        );
        assert_eq!(
            parse_callback("GET /oauth2callback HTTP/1.1"),
            Some(Callback::Missing)
        );
        assert_eq!(parse_callback("GET /favicon.ico HTTP/1.1"), None);
        assert_eq!(parse_callback(""), None);
    }

    #[test]
    fn test_build_auth_url_encodes_parameters() {
        let url = build_auth_url(
            "https://accounts.example.com/auth",
            "id.apps",
            "http://localhost:8080/oauth2callback",
        );
        assert!(url.starts_with("https://accounts.example.com/auth?client_id=id.apps&"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Foauth2callback"));
        assert!(url.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fphotoslibrary.readonly"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
    }

    #[test]
    fn test_callback_values_are_form_decoded() {
        assert_eq!(
            parse_callback("GET /oauth2callback?error=access+denied%21 HTTP/1.1"),
            Some(Callback::Denied("access denied!".to_string()))
        );
        assert_eq!(decode_query_value("100%"), "100%");
    }

    #[test]
    fn test_credentials_file_shape() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CREDENTIALS_FILE),
            r#"{"clientId":"cid","clientSecret":"secret","redirectUri":"http://localhost:1/oauth2callback"}"#,
        )
        .unwrap();

        let credentials = Credentials::load(dir.path()).unwrap();
        assert_eq!(credentials.client_id, "cid");
        assert_eq!(credentials.client_secret, "secret");

        credentials.save(dir.path()).unwrap();
        let raw = fs::read_to_string(dir.path().join(CREDENTIALS_FILE)).unwrap();
        assert!(raw.contains("\"clientId\""));
        assert!(raw.contains("\"redirectUri\""));
    }

    #[test]
    fn test_missing_files_are_configuration_errors() {
        let dir = tempdir().unwrap();

        let err = Credentials::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains(CREDENTIALS_FILE));
        assert!(err.to_string().contains("clientId"));

        let err = Tokens::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("shoebox auth"));

        fs::write(dir.path().join(TOKENS_FILE), "not json").unwrap();
        let err = Tokens::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("re-authenticate"));
    }

    #[test]
    fn test_token_expiry() {
        let response = TokenResponse {
            access_token: "a".to_string(),
            expires_in: Some(3600),
            refresh_token: None,
            scope: None,
            token_type: Some("Bearer".to_string()),
        };
        let tokens = response.into_tokens(1_000_000);
        assert_eq!(tokens.expiry_date, Some(4_600_000));
        assert!(!tokens.is_expired(1_000_000));
        assert!(tokens.is_expired(4_590_000));

        let no_expiry = Tokens {
            expiry_date: None,
            ..tokens
        };
        assert!(!no_expiry.is_expired(i64::MAX));
    }

    #[test]
    fn test_wait_for_code_skips_unrelated_requests() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = std::thread::spawn(move || {
            let mut responses = Vec::new();
            for request in [
                "GET /favicon.ico HTTP/1.1\r\nHost: localhost\r\n\r\n",
                "GET /oauth2callback?code=xyz HTTP/1.1\r\nHost: localhost\r\n\r\n",
            ] {
                let mut stream = TcpStream::connect(addr).unwrap();
                stream.write_all(request.as_bytes()).unwrap();
                let mut response = String::new();
                stream.read_to_string(&mut response).unwrap();
                responses.push(response);
            }
            responses
        });

        assert_eq!(wait_for_code(&listener).unwrap(), "xyz");
        let responses = browser.join().unwrap();
        assert!(responses[0].starts_with("HTTP/1.1 404"));
        assert!(responses[1].starts_with("HTTP/1.1 200"));
    }
}
