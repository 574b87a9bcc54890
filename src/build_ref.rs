use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StageViewError;

/// Address of one build: a job's full name plus its build number.
///
/// Parsed from the `<job-full-name>#<number>` form (e.g. `deploy#42`,
/// `team/api/deploy#7`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildRef {
    pub job_full_name: String,
    pub number: u64,
}

impl BuildRef {
    pub fn new(job_full_name: impl Into<String>, number: u64) -> Self {
        Self {
            job_full_name: job_full_name.into(),
            number,
        }
    }

    /// Short job name, i.e. the last `/`-separated segment of the full name.
    pub fn job_name(&self) -> &str {
        self.job_full_name
            .rsplit('/')
            .next()
            .unwrap_or(&self.job_full_name)
    }

    /// File-system friendly form of the job name (e.g. "team/api" → "team-api").
    pub fn job_slug(&self) -> String {
        self.job_full_name.replace('/', "-")
    }
}

impl fmt::Display for BuildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.job_full_name, self.number)
    }
}

impl FromStr for BuildRef {
    type Err = StageViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StageViewError::InvalidBuildRef(s.to_string());

        let (job, number) = s.rsplit_once('#').ok_or_else(invalid)?;
        let job = job.trim_matches('/');
        if job.is_empty() {
            return Err(invalid());
        }
        let number = number.parse::<u64>().map_err(|_| invalid())?;

        Ok(Self::new(job, number))
    }
}
