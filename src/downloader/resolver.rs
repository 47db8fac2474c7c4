//! Manual redirect resolution without downloading the body

use crate::utils::config::ManagerSettings;
use crate::utils::error::DlError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED, LOCATION};
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::debug;
use url::Url;

/// Terminal (non-redirect) response of a probe
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub final_url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    /// Every redirect target, in the order they were followed
    pub redirects: Vec<Url>,
}

impl ProbeResponse {
    fn header_str(&self, name: reqwest::header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header_str(CONTENT_LENGTH)
            .and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn content_type(&self) -> Option<String> {
        self.header_str(CONTENT_TYPE).map(str::to_string)
    }

    pub fn last_modified(&self) -> Option<String> {
        self.header_str(LAST_MODIFIED).map(str::to_string)
    }

    /// Filename of the final resolved URL
    pub fn filename(&self) -> String {
        filename_from_url(&self.final_url)
    }
}

/// Resolves redirects and response metadata for a URL
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &Url) -> Result<ProbeResponse, DlError>;
}

/// Probe built on a reqwest client with automatic redirects disabled
pub struct RedirectResolver {
    client: Client,
    max_redirects: usize,
}

impl RedirectResolver {
    pub fn new(settings: &ManagerSettings) -> Result<Self, DlError> {
        let mut builder = Client::builder()
            .redirect(Policy::none())
            .user_agent(settings.user_agent.as_str());
        if let Some(timeout) = settings.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            max_redirects: settings.max_redirects,
        })
    }

    /// Use a caller-built client. It must not follow redirects itself.
    pub fn with_client(client: Client, max_redirects: usize) -> Self {
        Self {
            client,
            max_redirects,
        }
    }
}

#[async_trait]
impl Probe for RedirectResolver {
    async fn probe(&self, url: &Url) -> Result<ProbeResponse, DlError> {
        let mut current = url.clone();
        let mut redirects = Vec::new();

        loop {
            let response = self.client.get(current.clone()).send().await?;
            let status = response.status();

            if status.is_redirection() {
                if let Some(target) = redirect_target(&current, response.headers())? {
                    if redirects.len() >= self.max_redirects {
                        return Err(DlError::TooManyRedirects {
                            url: url.to_string(),
                            limit: self.max_redirects,
                        });
                    }
                    debug!("Redirect {} {} -> {}", status.as_u16(), current, target);
                    redirects.push(target.clone());
                    current = target;
                    continue;
                }
            }

            // Dropping the response aborts the body
            let headers = response.headers().clone();
            drop(response);

            debug!(
                "Probe of {} resolved to {} with status {}",
                url,
                current,
                status.as_u16()
            );
            return Ok(ProbeResponse {
                final_url: current,
                status: status.as_u16(),
                headers,
                redirects,
            });
        }
    }
}

fn redirect_target(current: &Url, headers: &HeaderMap) -> Result<Option<Url>, DlError> {
    let Some(location) = headers.get(LOCATION) else {
        return Ok(None);
    };
    let location = location
        .to_str()
        .map_err(|_| DlError::InvalidUrl(format!("non-ASCII redirect from {}", current)))?;
    current
        .join(location)
        .map(Some)
        .map_err(|e| DlError::InvalidUrl(format!("{}: {}", location, e)))
}

/// Parse a user-supplied URL
pub fn parse_url(raw: &str) -> Result<Url, DlError> {
    Url::parse(raw).map_err(|e| DlError::InvalidUrl(format!("{}: {}", raw, e)))
}

/// Percent-decoded last path segment of `url`, reduced to a single file
/// name so it can never leave the folder it is joined onto
pub fn filename_from_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|raw| {
            urlencoding::decode(raw)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| raw.to_string())
        });

    segment
        .as_deref()
        .and_then(safe_file_name)
        .or_else(|| url.host_str().and_then(safe_file_name))
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// Filename for a raw URL string, used before (or instead of) a probe
pub fn filename_from_str(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => filename_from_url(&url),
        Err(_) => safe_file_name(raw).unwrap_or_else(|| DEFAULT_FILENAME.to_string()),
    }
}

const DEFAULT_FILENAME: &str = "download";

/// Last component of `name` that is a plain file name. Separators of
/// every platform count, and `.`/`..` are never a file name.
fn safe_file_name(name: &str) -> Option<String> {
    name.rsplit(['/', '\\'])
        .map(|part| part.trim_matches(|c: char| c.is_control() || c == ' '))
        .find(|part| !part.is_empty() && *part != "." && *part != "..")
        .map(|part| part.replace(':', "_"))
}
