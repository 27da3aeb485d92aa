use crate::config::{CdsConfig, CdsCredentials};
use crate::error::{AatoolboxError, Result};
use crate::http::HttpClient;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

/// Something that can fetch a CDS dataset request into a file
pub trait CdsRetrieve {
    fn retrieve(&self, name: &str, request: &Value, target: &Path) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct TaskReply {
    state: String,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

impl TaskReply {
    fn error_message(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| e.get("message").or_else(|| e.get("reason")))
            .and_then(Value::as_str)
            .unwrap_or("no reason given")
            .to_string()
    }
}

/// Client for the CDS web API: submit a request, poll it until it completes,
/// then stream the result to disk.
pub struct CdsClient {
    client: Client,
    credentials: CdsCredentials,
    max_poll: Duration,
}

impl CdsClient {
    pub fn new(http: &HttpClient, config: &CdsConfig) -> Result<Self> {
        Ok(Self {
            client: http.inner().clone(),
            credentials: config.credentials()?,
            max_poll: Duration::from_secs(config.max_poll_secs),
        })
    }

    fn submit(&self, name: &str, request: &Value) -> Result<TaskReply> {
        let (user, password) = self.credentials.basic_auth()?;
        let url = format!("{}/resources/{}", self.credentials.url, name);
        let reply = self
            .client
            .post(&url)
            .basic_auth(user, Some(password))
            .json(request)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(reply)
    }

    fn poll(&self, request_id: &str) -> Result<TaskReply> {
        let (user, password) = self.credentials.basic_auth()?;
        let url = format!("{}/tasks/{}", self.credentials.url, request_id);
        let reply = self
            .client
            .get(&url)
            .basic_auth(user, Some(password))
            .send()?
            .error_for_status()?
            .json()?;
        Ok(reply)
    }

    fn result_url(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else {
            format!("{}/{}", self.credentials.url, location.trim_start_matches('/'))
        }
    }
}

impl CdsRetrieve for CdsClient {
    fn retrieve(&self, name: &str, request: &Value, target: &Path) -> Result<()> {
        let mut reply = self.submit(name, request)?;
        let mut sleep = Duration::from_secs(1).min(self.max_poll);

        loop {
            match reply.state.as_str() {
                "completed" => break,
                "failed" => return Err(AatoolboxError::Cds(reply.error_message())),
                "queued" | "running" => {
                    let request_id = reply.request_id.clone().ok_or_else(|| {
                        AatoolboxError::Cds(format!("{} request has no id", reply.state))
                    })?;
                    log::debug!("Request {} is {}, sleeping {:?}", request_id, reply.state, sleep);
                    std::thread::sleep(sleep);
                    sleep = sleep.mul_f64(1.5).min(self.max_poll);
                    reply = self.poll(&request_id)?;
                }
                other => return Err(AatoolboxError::Cds(format!("unexpected state '{}'", other))),
            }
        }

        let location = reply
            .location
            .as_deref()
            .ok_or_else(|| AatoolboxError::Cds("completed request has no location".to_string()))?;

        // Stream into a side file so an interrupted download never looks cached
        let partial = target.with_extension("part");
        {
            let mut response = self
                .client
                .get(self.result_url(location))
                .send()?
                .error_for_status()?;
            let mut writer = BufWriter::new(File::create(&partial)?);
            response.copy_to(&mut writer)?;
        }
        std::fs::rename(&partial, target)?;
        Ok(())
    }
}
