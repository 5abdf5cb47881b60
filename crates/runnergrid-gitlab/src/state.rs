//! Per-tick cluster state.
//!
//! `ClusterState` is an immutable snapshot of the group's job backlog,
//! built once per tick and discarded afterwards. Totals count jobs; the
//! per-tag maps count tag occurrences (a job contributes one occurrence
//! per tag it carries).

use std::collections::HashMap;

use tracing::{info, warn};

use crate::client::{GitlabClient, JobScope, Project};

/// Aggregated job backlog of the whole group for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterState {
    /// Total pending job count across all projects.
    pub total_pending: i64,
    /// Total running job count across all projects.
    pub total_running: i64,
    /// Pending jobs carrying no tag at all.
    pub pending_without_tags: i64,
    /// Running jobs carrying no tag at all.
    pub running_without_tags: i64,
    /// Tag → pending tag occurrences.
    pub pending_by_tag: HashMap<String, i64>,
    /// Tag → running tag occurrences.
    pub running_by_tag: HashMap<String, i64>,
}

impl ClusterState {
    /// Pending occurrences of `tag`; absent tags read as zero.
    pub fn pending_for_tag(&self, tag: &str) -> i64 {
        self.pending_by_tag.get(tag).copied().unwrap_or(0)
    }

    /// Running occurrences of `tag`; absent tags read as zero.
    pub fn running_for_tag(&self, tag: &str) -> i64 {
        self.running_by_tag.get(tag).copied().unwrap_or(0)
    }
}

/// One project's fetched job figures for a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectJobs {
    pub project: Project,
    pub pending_count: i64,
    pub pending_tags: Vec<String>,
    pub running_count: i64,
    pub running_tags: Vec<String>,
}

impl GitlabClient {
    /// Fetch both job scopes for every project concurrently and fold the
    /// results into a [`ClusterState`].
    ///
    /// A project whose fetch fails is logged and skipped; the remaining
    /// projects are unaffected.
    pub async fn collect(&self, projects: &[Project]) -> ClusterState {
        let mut handles = Vec::with_capacity(projects.len());
        for project in projects {
            let client = self.clone();
            let project = project.clone();
            handles.push(tokio::spawn(async move {
                let (pending_count, pending_tags) =
                    client.fetch_jobs(project.id, JobScope::Pending).await?;
                let (running_count, running_tags) =
                    client.fetch_jobs(project.id, JobScope::Running).await?;
                Ok::<ProjectJobs, crate::GitlabError>(ProjectJobs {
                    project,
                    pending_count,
                    pending_tags,
                    running_count,
                    running_tags,
                })
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Ok(jobs)) => {
                    info!(
                        project = %jobs.project.name,
                        id = jobs.project.id,
                        pending = jobs.pending_count,
                        pending_tags = ?jobs.pending_tags,
                        running = jobs.running_count,
                        running_tags = ?jobs.running_tags,
                        "project jobs"
                    );
                    results.push(jobs);
                }
                Ok(Err(err)) => warn!(error = %err, "skipping project after fetch failure"),
                Err(err) => warn!(error = %err, "project fetch task failed"),
            }
        }

        aggregate(&results)
    }
}

/// Fold per-project figures into the tick's snapshot.
pub(crate) fn aggregate(results: &[ProjectJobs]) -> ClusterState {
    let mut state = ClusterState::default();
    for jobs in results {
        state.total_pending += jobs.pending_count;
        state.total_running += jobs.running_count;

        // Jobs exist but the flattened tag list is empty: all of them
        // are untagged.
        if jobs.pending_count > 0 && jobs.pending_tags.is_empty() {
            state.pending_without_tags += jobs.pending_count;
        }
        if jobs.running_count > 0 && jobs.running_tags.is_empty() {
            state.running_without_tags += jobs.running_count;
        }

        for tag in &jobs.pending_tags {
            *state.pending_by_tag.entry(tag.clone()).or_insert(0) += 1;
        }
        for tag in &jobs.running_tags {
            *state.running_by_tag.entry(tag.clone()).or_insert(0) += 1;
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: i64, name: &str) -> Project {
        Project {
            id,
            name: name.to_string(),
        }
    }

    fn jobs(
        id: i64,
        pending: (i64, &[&str]),
        running: (i64, &[&str]),
    ) -> ProjectJobs {
        ProjectJobs {
            project: project(id, &format!("p{id}")),
            pending_count: pending.0,
            pending_tags: pending.1.iter().map(|t| t.to_string()).collect(),
            running_count: running.0,
            running_tags: running.1.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn empty_input_yields_default_state() {
        assert_eq!(aggregate(&[]), ClusterState::default());
    }

    #[test]
    fn totals_count_jobs_not_tag_occurrences() {
        // Two pending jobs carrying three tag occurrences between them.
        let state = aggregate(&[jobs(1, (2, &["amd64", "amd64", "docker"]), (0, &[]))]);
        assert_eq!(state.total_pending, 2);
        assert_eq!(state.pending_for_tag("amd64"), 2);
        assert_eq!(state.pending_for_tag("docker"), 1);
        assert_eq!(state.pending_without_tags, 0);
    }

    #[test]
    fn untagged_jobs_counted_when_tag_list_empty() {
        let state = aggregate(&[jobs(1, (3, &[]), (2, &[]))]);
        assert_eq!(state.pending_without_tags, 3);
        assert_eq!(state.running_without_tags, 2);
        assert_eq!(state.total_pending, 3);
        assert_eq!(state.total_running, 2);
    }

    #[test]
    fn tags_accumulate_across_projects() {
        let state = aggregate(&[
            jobs(1, (1, &["amd64"]), (1, &["arm64"])),
            jobs(2, (2, &["amd64", "gpu"]), (0, &[])),
        ]);
        assert_eq!(state.total_pending, 3);
        assert_eq!(state.total_running, 1);
        assert_eq!(state.pending_for_tag("amd64"), 2);
        assert_eq!(state.pending_for_tag("gpu"), 1);
        assert_eq!(state.running_for_tag("arm64"), 1);
    }

    #[test]
    fn absent_tags_read_zero() {
        let state = aggregate(&[jobs(1, (1, &["amd64"]), (0, &[]))]);
        assert_eq!(state.pending_for_tag("missing"), 0);
        assert_eq!(state.running_for_tag("missing"), 0);
    }

    #[test]
    fn tag_occurrences_at_least_tagged_job_count() {
        // A tagged job contributes at least one occurrence, so the sum of
        // the per-tag map dominates the tagged-job count.
        let state = aggregate(&[
            jobs(1, (2, &["a", "b", "a"]), (0, &[])),
            jobs(2, (1, &["c"]), (0, &[])),
        ]);
        let occurrences: i64 = state.pending_by_tag.values().sum();
        let tagged_jobs = state.total_pending - state.pending_without_tags;
        assert!(occurrences >= tagged_jobs);
    }
}
