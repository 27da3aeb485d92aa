use crate::config::HttpConfig;
use crate::error::Result;
use reqwest::blocking::Client;

/// Source of remote files
pub trait Fetch {
    /// Body of `url`, or `None` when the server answers with an error status
    fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>>;
}

/// Blocking HTTP client configured from [`HttpConfig`]
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }
}

impl Fetch for HttpClient {
    fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
        log::debug!("GET {}", url);
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            log::debug!("{} answered {}", url, status);
            return Ok(None);
        }
        Ok(Some(response.bytes()?.to_vec()))
    }
}
