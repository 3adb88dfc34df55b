//! Source descriptors and the reader that opens them.

use crate::context::non_blank_env;
use crate::types::ConfigError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable holding a bearer token for remote sources.
pub const CONFIG_TOKEN_ENV: &str = "CASC_CONFIG_TOKEN";

/// Environment variable holding the basic-auth user for remote sources.
pub const CONFIG_USER_ENV: &str = "CASC_CONFIG_USER";

/// Environment variable holding the basic-auth password for remote sources.
pub const CONFIG_PASSWORD_ENV: &str = "CASC_CONFIG_PASSWORD";

/// A stream opened from a source, released when dropped.
pub type SourceStream = Box<dyn BufRead + Send>;

/// One physical origin of YAML text.
///
/// The `Display` form is the provenance label used in node locations and
/// error messages.
pub enum YamlSource {
    /// A remote (or `file://`) URL.
    Url(String),

    /// An in-memory byte stream.
    Stream {
        name: String,
        reader: Box<dyn Read + Send>,
    },

    /// The body of an inbound HTTP request.
    Request(InboundRequest),

    /// A file on the local filesystem.
    Path(PathBuf),
}

/// The parts of an inbound HTTP request needed to read its body as YAML.
pub struct InboundRequest {
    pub method: String,
    pub uri: String,
    body: Box<dyn Read + Send>,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>, body: impl Read + Send + 'static) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            body: Box::new(body),
        }
    }
}

impl YamlSource {
    pub fn url(url: impl Into<String>) -> Self {
        YamlSource::Url(url.into())
    }

    pub fn path(path: impl AsRef<Path>) -> Self {
        YamlSource::Path(path.as_ref().to_path_buf())
    }

    pub fn stream(name: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        YamlSource::Stream {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    /// An in-memory document, mostly useful for tests and embedding.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::stream(name, Cursor::new(bytes.into()))
    }

    pub fn request(request: InboundRequest) -> Self {
        YamlSource::Request(request)
    }

    /// The provenance label of this source.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for YamlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YamlSource::Url(url) => f.write_str(url),
            YamlSource::Stream { name, .. } => write!(f, "stream {name}"),
            YamlSource::Request(request) => write!(f, "request {} {}", request.method, request.uri),
            YamlSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl fmt::Debug for YamlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("YamlSource").field(&self.to_string()).finish()
    }
}

/// Credentials attached to remote requests.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Credentials")
            .field("token", &redact(&self.token))
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .finish()
    }
}

/// The single `Authorization` scheme chosen for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Bearer(String),
    /// Already base64-encoded `user:password`.
    Basic(String),
}

impl Authorization {
    pub fn scheme(&self) -> &'static str {
        match self {
            Authorization::Bearer(_) => "Bearer",
            Authorization::Basic(_) => "Basic",
        }
    }

    pub fn header_value(&self) -> String {
        match self {
            Authorization::Bearer(token) => format!("Bearer {token}"),
            Authorization::Basic(encoded) => format!("Basic {encoded}"),
        }
    }
}

impl Credentials {
    /// Pick the authorization scheme: a token wins over user and password,
    /// which are only used together. Blank values count as absent.
    pub fn authorization(&self) -> Option<Authorization> {
        let present = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

        if let Some(token) = present(&self.token) {
            return Some(Authorization::Bearer(token));
        }

        match (present(&self.user), present(&self.password)) {
            (Some(user), Some(password)) => {
                Some(Authorization::Basic(STANDARD.encode(format!("{user}:{password}"))))
            }
            _ => None,
        }
    }
}

/// Where the reader gets credentials from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read the named environment variables each time a URL is opened.
    Environment {
        token_var: String,
        user_var: String,
        password_var: String,
    },
    /// Use these credentials for every request.
    Fixed(Credentials),
}

impl Default for CredentialSource {
    fn default() -> Self {
        CredentialSource::Environment {
            token_var: CONFIG_TOKEN_ENV.to_string(),
            user_var: CONFIG_USER_ENV.to_string(),
            password_var: CONFIG_PASSWORD_ENV.to_string(),
        }
    }
}

impl CredentialSource {
    pub fn resolve(&self) -> Credentials {
        match self {
            CredentialSource::Environment {
                token_var,
                user_var,
                password_var,
            } => Credentials {
                token: non_blank_env(token_var),
                user: non_blank_env(user_var),
                password: non_blank_env(password_var),
            },
            CredentialSource::Fixed(credentials) => credentials.clone(),
        }
    }
}

/// Opens [`YamlSource`]s as character streams.
#[derive(Debug, Default)]
pub struct SourceReader {
    client: Option<Client>,
    credentials: CredentialSource,
}

impl SourceReader {
    /// A reader that takes credentials from the default environment variables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured HTTP client, e.g. one with connection timeouts.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialSource) -> Self {
        self.credentials = credentials;
        self
    }

    /// Open a source as a buffered UTF-8 character stream.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] when the source cannot be reached,
    /// [`ConfigError::UnknownSource`] when no reader handles it.
    pub fn open(&self, source: YamlSource) -> Result<SourceStream, ConfigError> {
        let label = source.label();
        match source {
            YamlSource::Url(raw) => self.open_url(&raw, label),
            YamlSource::Stream { reader, .. } => Ok(Box::new(BufReader::new(reader))),
            YamlSource::Request(request) => Ok(Box::new(BufReader::new(request.body))),
            YamlSource::Path(path) => open_path(&path, label),
        }
    }

    fn open_url(&self, raw: &str, label: String) -> Result<SourceStream, ConfigError> {
        let url = Url::parse(raw).map_err(|e| ConfigError::UnknownSource {
            source_label: label.clone(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => self.open_http(url, label),
            "file" => match url.to_file_path() {
                Ok(path) => open_path(&path, label),
                Err(()) => Err(ConfigError::UnknownSource {
                    source_label: label,
                    reason: "file URL does not name a local path".into(),
                }),
            },
            other => Err(ConfigError::UnknownSource {
                source_label: label,
                reason: format!("unsupported URL scheme '{other}'"),
            }),
        }
    }

    fn open_http(&self, url: Url, label: String) -> Result<SourceStream, ConfigError> {
        let client = match &self.client {
            Some(client) => client.clone(),
            None => Client::builder().build().map_err(|e| read_error(&label, e))?,
        };

        let mut request = client.get(url);
        if let Some(authorization) = self.credentials.resolve().authorization() {
            tracing::debug!(source = %label, scheme = authorization.scheme(), "attaching authorization");
            request = request.header(AUTHORIZATION, authorization.header_value());
        }

        let response = request
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| read_error(&label, e))?;

        Ok(Box::new(BufReader::new(response)))
    }
}

fn open_path(path: &Path, label: String) -> Result<SourceStream, ConfigError> {
    let file = File::open(path).map_err(|cause| ConfigError::Read {
        source_label: label,
        cause,
    })?;
    Ok(Box::new(BufReader::new(file)))
}

fn read_error(label: &str, err: reqwest::Error) -> ConfigError {
    ConfigError::Read {
        source_label: label.to_string(),
        cause: io::Error::other(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::EnvVarGuard;
    use mockito::Matcher;
    use serial_test::serial;
    use std::io::Write;

    fn fixed(token: Option<&str>, user: Option<&str>, password: Option<&str>) -> SourceReader {
        SourceReader::new().with_credentials(CredentialSource::Fixed(Credentials {
            token: token.map(str::to_string),
            user: user.map(str::to_string),
            password: password.map(str::to_string),
        }))
    }

    fn read_all(mut stream: SourceStream) -> String {
        let mut content = String::new();
        stream.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn labels_are_stable_and_descriptive() {
        assert_eq!(YamlSource::path("/etc/casc/jenkins.yaml").label(), "/etc/casc/jenkins.yaml");
        assert_eq!(
            YamlSource::url("https://example.com/casc.yaml").label(),
            "https://example.com/casc.yaml"
        );
        assert_eq!(YamlSource::from_bytes("inline", "a: 1").label(), "stream inline");
        let request = InboundRequest::new("POST", "/configuration-as-code/apply", io::empty());
        assert_eq!(
            YamlSource::request(request).label(),
            "request POST /configuration-as-code/apply"
        );
    }

    #[test]
    fn token_wins_over_basic_credentials() {
        let credentials = Credentials {
            token: Some("tok".into()),
            user: Some("admin".into()),
            password: Some("secret".into()),
        };
        assert_eq!(credentials.authorization(), Some(Authorization::Bearer("tok".into())));
    }

    #[test]
    fn basic_needs_both_user_and_password() {
        let user_only = Credentials {
            user: Some("admin".into()),
            ..Credentials::default()
        };
        assert_eq!(user_only.authorization(), None);

        let both = Credentials {
            user: Some("admin".into()),
            password: Some("secret".into()),
            ..Credentials::default()
        };
        // base64("admin:secret")
        assert_eq!(both.authorization(), Some(Authorization::Basic("YWRtaW46c2VjcmV0".into())));
    }

    #[test]
    fn blank_values_are_absent() {
        let credentials = Credentials {
            token: Some("   ".into()),
            user: Some("admin".into()),
            password: Some("".into()),
        };
        assert_eq!(credentials.authorization(), None);
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let credentials = Credentials {
            token: Some("tok".into()),
            ..Credentials::default()
        };
        let debug = format!("{credentials:?}");
        assert!(!debug.contains("tok\""));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn opens_filesystem_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "jenkins:\n  systemMessage: hi").unwrap();

        let stream = SourceReader::new().open(YamlSource::path(file.path())).unwrap();
        assert!(read_all(stream).contains("systemMessage"));
    }

    #[test]
    fn missing_file_is_read_error_naming_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        let err = SourceReader::new().open(YamlSource::path(&path)).err().expect("expected an error");
        match err {
            ConfigError::Read { source_label, .. } => {
                assert_eq!(source_label, path.display().to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn opens_file_url() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "a: 1").unwrap();
        let url = Url::from_file_path(file.path()).unwrap();

        let stream = SourceReader::new().open(YamlSource::url(url.as_str())).unwrap();
        assert_eq!(read_all(stream), "a: 1");
    }

    #[test]
    fn unsupported_scheme_is_unknown_source() {
        let err = SourceReader::new()
            .open(YamlSource::url("ftp://example.com/casc.yaml"))
            .err().expect("expected an error");
        assert!(matches!(err, ConfigError::UnknownSource { .. }));
        assert!(err.to_string().starts_with("Unknown ftp://example.com/casc.yaml"));
    }

    #[test]
    fn unparsable_url_is_unknown_source() {
        let err = SourceReader::new().open(YamlSource::url("not a url")).err().expect("expected an error");
        assert!(matches!(err, ConfigError::UnknownSource { .. }));
    }

    #[test]
    fn stream_and_request_bodies_pass_through() {
        let reader = SourceReader::new();
        let stream = reader.open(YamlSource::from_bytes("inline", "a: 1")).unwrap();
        assert_eq!(read_all(stream), "a: 1");

        let request = InboundRequest::new("POST", "/apply", Cursor::new(b"b: 2".to_vec()));
        let stream = reader.open(YamlSource::request(request)).unwrap();
        assert_eq!(read_all(stream), "b: 2");
    }

    #[test]
    fn bearer_token_is_sent_alone() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/casc.yaml")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body("a: 1")
            .expect(1)
            .create();

        let reader = fixed(Some("tok"), Some("admin"), Some("secret"));
        let stream = reader
            .open(YamlSource::url(format!("{}/casc.yaml", server.url())))
            .unwrap();
        assert_eq!(read_all(stream), "a: 1");
        mock.assert();
    }

    #[test]
    fn basic_credentials_are_sent() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/casc.yaml")
            .match_header("authorization", "Basic YWRtaW46c2VjcmV0")
            .with_status(200)
            .with_body("a: 1")
            .expect(1)
            .create();

        let reader = fixed(None, Some("admin"), Some("secret"));
        reader
            .open(YamlSource::url(format!("{}/casc.yaml", server.url())))
            .unwrap();
        mock.assert();
    }

    #[test]
    fn no_credentials_means_no_header() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/casc.yaml")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("a: 1")
            .expect(1)
            .create();

        let reader = fixed(None, None, None);
        reader
            .open(YamlSource::url(format!("{}/casc.yaml", server.url())))
            .unwrap();
        mock.assert();
    }

    #[test]
    fn http_error_status_is_read_error() {
        let mut server = mockito::Server::new();
        let mock = server.mock("GET", "/casc.yaml").with_status(403).expect(1).create();

        let url = format!("{}/casc.yaml", server.url());
        let err = fixed(None, None, None).open(YamlSource::url(&url)).err().expect("expected an error");
        match err {
            ConfigError::Read { source_label, .. } => assert_eq!(source_label, url),
            other => panic!("unexpected error: {other}"),
        }
        mock.assert();
    }

    #[test]
    #[serial]
    fn environment_credentials_are_read_per_request() {
        let mut server = mockito::Server::new();
        let url = format!("{}/casc.yaml", server.url());
        let reader = SourceReader::new();

        let _token = EnvVarGuard::remove(CONFIG_TOKEN_ENV);
        let _user = EnvVarGuard::set(CONFIG_USER_ENV, "admin");
        let _password = EnvVarGuard::set(CONFIG_PASSWORD_ENV, "secret");
        let basic = server
            .mock("GET", "/casc.yaml")
            .match_header("authorization", "Basic YWRtaW46c2VjcmV0")
            .with_body("a: 1")
            .expect(1)
            .create();
        reader.open(YamlSource::url(&url)).unwrap();
        basic.assert();

        let _token = EnvVarGuard::set(CONFIG_TOKEN_ENV, "fresh");
        let bearer = server
            .mock("GET", "/casc.yaml")
            .match_header("authorization", "Bearer fresh")
            .with_body("a: 1")
            .expect(1)
            .create();
        reader.open(YamlSource::url(&url)).unwrap();
        bearer.assert();
    }
}
