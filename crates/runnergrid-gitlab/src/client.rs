//! GitLab HTTP client.
//!
//! One shared `reqwest::Client` with a hard total timeout serves every
//! request of the process. Both endpoints share the same retry policy:
//! up to [`MAX_ATTEMPTS`] tries, sleeping `2^(attempt+1)` seconds on
//! HTTP 429 (2, 4, 8, 16, 32). Any other non-200 status aborts with the
//! status; transport errors propagate immediately.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::warn;

use crate::error::{GitlabError, GitlabResult};

const DEFAULT_BASE_URL: &str = "https://gitlab.com/api/v4";
const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(25);
const MAX_ATTEMPTS: u32 = 5;

/// A GitLab project as returned by the group projects listing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

/// Job scope selector for the jobs endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobScope {
    Pending,
    Running,
}

impl JobScope {
    pub fn as_str(self) -> &'static str {
        match self {
            JobScope::Pending => "pending",
            JobScope::Running => "running",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Job {
    #[allow(dead_code)]
    id: i64,
    #[serde(default)]
    tag_list: Vec<String>,
}

/// Client for the subset of the GitLab API the autoscaler consumes.
#[derive(Debug, Clone)]
pub struct GitlabClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl GitlabClient {
    /// Build a client with the shared request timeout.
    pub fn new(token: &str) -> GitlabResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            token: token.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API root. Used by tests.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// List the group's projects (subgroups included, page size 100),
    /// dropping any project whose name appears in `exclude`.
    pub async fn fetch_projects(
        &self,
        group: &str,
        exclude: &[String],
    ) -> GitlabResult<Vec<Project>> {
        let url = format!("{}/groups/{}/projects", self.base_url, group);
        let context = format!("fetching projects of group {group}");

        for attempt in 0..MAX_ATTEMPTS {
            let response = self
                .http
                .get(&url)
                .query(&[("include_subgroups", "true"), ("per_page", "100")])
                .header(PRIVATE_TOKEN_HEADER, &self.token)
                .send()
                .await?;

            match response.status() {
                StatusCode::TOO_MANY_REQUESTS => {
                    backoff(attempt, &context).await;
                }
                StatusCode::OK => {
                    let projects: Vec<Project> = response.json().await?;
                    return Ok(projects
                        .into_iter()
                        .filter(|project| !exclude.contains(&project.name))
                        .collect());
                }
                status => {
                    return Err(GitlabError::Status {
                        status: status.as_u16(),
                        context,
                    });
                }
            }
        }
        Err(GitlabError::RetriesExhausted {
            attempts: MAX_ATTEMPTS,
            context,
        })
    }

    /// Fetch one project's jobs for a scope; returns the job count and
    /// the `tag_list` values flattened across all jobs (one occurrence
    /// per tag per job).
    pub async fn fetch_jobs(
        &self,
        project_id: i64,
        scope: JobScope,
    ) -> GitlabResult<(i64, Vec<String>)> {
        let url = format!("{}/projects/{}/jobs", self.base_url, project_id);
        let context = format!(
            "fetching {} jobs of project {project_id}",
            scope.as_str()
        );

        for attempt in 0..MAX_ATTEMPTS {
            let response = self
                .http
                .get(&url)
                .query(&[("scope", scope.as_str())])
                .header(PRIVATE_TOKEN_HEADER, &self.token)
                .send()
                .await?;

            match response.status() {
                StatusCode::TOO_MANY_REQUESTS => {
                    backoff(attempt, &context).await;
                }
                StatusCode::OK => {
                    let jobs: Vec<Job> = response.json().await?;
                    let count = jobs.len() as i64;
                    let tags = jobs.into_iter().flat_map(|job| job.tag_list).collect();
                    return Ok((count, tags));
                }
                status => {
                    return Err(GitlabError::Status {
                        status: status.as_u16(),
                        context,
                    });
                }
            }
        }
        Err(GitlabError::RetriesExhausted {
            attempts: MAX_ATTEMPTS,
            context,
        })
    }
}

/// Sleep out a 429 before the next attempt.
async fn backoff(attempt: u32, context: &str) {
    let wait = rate_limit_delay(attempt);
    warn!(
        wait_secs = wait.as_secs(),
        context, "received 429 Too Many Requests, retrying"
    );
    tokio::time::sleep(wait).await;
}

/// 2, 4, 8, 16, 32 seconds for attempts 0..5.
fn rate_limit_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64 << attempt)
}
