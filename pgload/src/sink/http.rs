use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

use crate::benchmark::Job;
use crate::error::{ErrorKind, LoadResult};
use crate::sink::Sink;
use crate::{bail, load_error};

/// Endpoint answering after a two second delay, used when no URL is configured.
pub const DEFAULT_HTTP_SINK_URL: &str = "https://httpbin.org/delay/2";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Sink issuing one `GET` request per job.
///
/// Any response with a non-success status is a failure. The body is not inspected.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    url: Url,
}

impl HttpSink {
    pub fn new(url: &str) -> LoadResult<Self> {
        let url = Url::parse(url).map_err(|err| {
            load_error!(
                ErrorKind::ConfigError,
                "The HTTP sink URL is invalid",
                format!("Could not parse '{url}': {err}")
            )
        })?;

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Sink for HttpSink {
    type Unit = Job;

    fn name() -> &'static str {
        "http"
    }

    async fn apply(&self, job: &Job) -> LoadResult<()> {
        let response = self.client.get(self.url.clone()).send().await?;

        let status = response.status();
        debug!(job = %job.label, %status, "request completed");

        if !status.is_success() {
            bail!(
                ErrorKind::SinkRequestFailed,
                "The HTTP request returned an error status",
                format!("{} returned {status} for {}", self.url, job.label)
            );
        }

        Ok(())
    }
}
