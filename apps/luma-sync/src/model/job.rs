use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

/// A verification job claimed from the server queue.
#[derive(Debug, Clone)]
pub struct Job {
    id: String,
    probe_name: String,
    status: JobStatus,
}

impl Job {
    pub fn new(id: impl Into<String>, probe_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            probe_name: probe_name.into(),
            status: JobStatus::Pending,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn probe_name(&self) -> &str {
        &self.probe_name
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Terminal states are sticky; only a pending job transitions.
    pub fn mark_completed(&mut self) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Completed;
        }
    }

    pub fn mark_failed(&mut self) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Failed;
        }
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Job {}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {} for probe {}", self.id, self.probe_name)
    }
}
