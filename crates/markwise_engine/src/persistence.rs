//! Profile and submission persistence.
//!
//! State lives in the data directory under:
//! ```text
//! .markwise/
//! ├── settings.json          # engine configuration overrides
//! ├── profile.json           # persisted user profile
//! └── submissions/<id>.json  # completed submissions, one file each
//! ```
//!
//! The orchestrator only touches this through [`SessionStore`], so tests can
//! substitute [`MemoryStore`].

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use markwise_core::{Submission, SubmissionStatus, UserProfile};

use crate::error::{EngineError, EngineResult};

/// Most recent submissions consulted per insight lookup.
const RECENT_SUBMISSION_LIMIT: usize = 3;

/// Narrow persistence interface consumed by the orchestrator.
pub trait SessionStore: Send + Sync {
    /// Persisted profile, if one exists.
    fn load_profile(&self) -> EngineResult<Option<UserProfile>>;

    /// Persist the profile (best-effort at call sites).
    fn save_profile(&self, profile: &UserProfile) -> EngineResult<()>;

    /// Persist a completed submission.
    fn save_submission(&self, submission: &Submission) -> EngineResult<()>;

    /// Free-text summary of recent insights for a subject; empty on miss.
    fn recent_insights(&self, subject: &str) -> EngineResult<String>;
}

/// File-backed store under `<root>/.markwise/`.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at the data directory (the parent of
    /// `.markwise/`). Directories are created lazily on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn store_dir(&self) -> PathBuf {
        self.root.join(crate::config::DATA_DIR_NAME)
    }

    fn profile_path(&self) -> PathBuf {
        self.store_dir().join("profile.json")
    }

    fn submissions_dir(&self) -> PathBuf {
        self.store_dir().join("submissions")
    }

    /// All persisted submissions, unordered. Unreadable files are skipped.
    fn load_submissions(&self) -> EngineResult<Vec<Submission>> {
        let dir = self.submissions_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut submissions = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<Submission>(&content) {
                Ok(submission) => submissions.push(submission),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable submission"),
            }
        }
        Ok(submissions)
    }
}

impl SessionStore for FileStore {
    fn load_profile(&self) -> EngineResult<Option<UserProfile>> {
        let path = self.profile_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save_profile(&self, profile: &UserProfile) -> EngineResult<()> {
        fs::create_dir_all(self.store_dir())?;
        let content = serde_json::to_string_pretty(profile)?;
        fs::write(self.profile_path(), content)?;
        Ok(())
    }

    fn save_submission(&self, submission: &Submission) -> EngineResult<()> {
        let dir = self.submissions_dir();
        fs::create_dir_all(&dir)?;
        let content = serde_json::to_string_pretty(submission)?;
        fs::write(dir.join(format!("{}.json", submission.id)), content)?;
        Ok(())
    }

    fn recent_insights(&self, subject: &str) -> EngineResult<String> {
        let mut completed: Vec<Submission> = self
            .load_submissions()?
            .into_iter()
            .filter(|s| s.status == SubmissionStatus::Completed)
            .filter(|s| {
                s.result
                    .as_ref()
                    .map_or(false, |r| r.subject.eq_ignore_ascii_case(subject))
            })
            .collect();

        completed.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let lines: Vec<String> = completed
            .iter()
            .take(RECENT_SUBMISSION_LIMIT)
            .filter_map(|s| s.result.as_ref())
            .flat_map(|r| &r.insights)
            .map(|i| format!("- {} [{}]: {}", i.title, i.trend.as_str(), i.description))
            .collect();

        Ok(lines.join("\n"))
    }
}

/// In-memory store for tests and guest-adjacent tooling.
#[derive(Clone, Default)]
pub struct MemoryStore {
    profile: std::sync::Arc<parking_lot::RwLock<Option<UserProfile>>>,
    submissions: std::sync::Arc<parking_lot::RwLock<Vec<Submission>>>,
    canned_insights: std::sync::Arc<parking_lot::RwLock<Option<String>>>,
    fail_saves: std::sync::Arc<parking_lot::RwLock<bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the stored profile.
    pub fn with_profile(self, profile: UserProfile) -> Self {
        *self.profile.write() = Some(profile);
        self
    }

    /// Return this text from every `recent_insights` call.
    pub fn with_insights(self, text: impl Into<String>) -> Self {
        *self.canned_insights.write() = Some(text.into());
        self
    }

    /// Make save operations fail, for error-path tests.
    pub fn failing_saves(self) -> Self {
        *self.fail_saves.write() = true;
        self
    }

    /// Submissions saved so far.
    pub fn saved_submissions(&self) -> Vec<Submission> {
        self.submissions.read().clone()
    }

    /// Profile as currently stored.
    pub fn stored_profile(&self) -> Option<UserProfile> {
        self.profile.read().clone()
    }
}

impl SessionStore for MemoryStore {
    fn load_profile(&self) -> EngineResult<Option<UserProfile>> {
        Ok(self.profile.read().clone())
    }

    fn save_profile(&self, profile: &UserProfile) -> EngineResult<()> {
        if *self.fail_saves.read() {
            return Err(EngineError::Persistence("simulated save failure".to_string()));
        }
        *self.profile.write() = Some(profile.clone());
        Ok(())
    }

    fn save_submission(&self, submission: &Submission) -> EngineResult<()> {
        if *self.fail_saves.read() {
            return Err(EngineError::Persistence("simulated save failure".to_string()));
        }
        self.submissions.write().push(submission.clone());
        Ok(())
    }

    fn recent_insights(&self, _subject: &str) -> EngineResult<String> {
        Ok(self.canned_insights.read().clone().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use markwise_core::{
        AnalysisResult, Insight, InsightTrend, OwnershipContext, Score, UserRole,
    };

    fn completed_submission(subject: &str, title: &str, trend: InsightTrend) -> Submission {
        let mut submission = Submission::new("work.png");
        submission.status = SubmissionStatus::Completed;
        submission.result = Some(AnalysisResult {
            id: submission.id.clone(),
            timestamp: Utc::now(),
            subject: subject.to_string(),
            topic: "Topic".to_string(),
            score: Score::pending(),
            feedback: Vec::new(),
            insights: vec![Insight {
                title: title.to_string(),
                description: "desc".to_string(),
                trend,
            }],
            guidance: Vec::new(),
            handwriting: None,
            concept_stability: None,
            teacher_insight: None,
            ownership: OwnershipContext::student_direct(),
            raw_text: String::new(),
        });
        submission
    }

    #[test]
    fn test_profile_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert!(store.load_profile().unwrap().is_none());

        let profile = UserProfile {
            name: Some("Ada Lovelace".to_string()),
            role: Some(UserRole::Teacher),
        };
        store.save_profile(&profile).unwrap();

        let loaded = store.load_profile().unwrap().unwrap();
        assert_eq!(loaded, profile);
    }

    #[test]
    fn test_submission_save_and_insight_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store
            .save_submission(&completed_submission("Math", "Sign errors", InsightTrend::Declining))
            .unwrap();
        store
            .save_submission(&completed_submission("History", "Dates", InsightTrend::Stable))
            .unwrap();

        let insights = store.recent_insights("math").unwrap();
        assert!(insights.contains("Sign errors"));
        assert!(insights.contains("[declining]"));
        assert!(!insights.contains("Dates"));
    }

    #[test]
    fn test_insights_empty_on_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.recent_insights("Math").unwrap(), "");
    }

    #[test]
    fn test_incomplete_submissions_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let mut submission = completed_submission("Math", "Sign errors", InsightTrend::New);
        submission.status = SubmissionStatus::Error;
        store.save_submission(&submission).unwrap();

        assert_eq!(store.recent_insights("Math").unwrap(), "");
    }

    #[test]
    fn test_memory_store_behaviors() {
        let store = MemoryStore::new()
            .with_profile(UserProfile {
                name: Some("Sam".to_string()),
                role: Some(UserRole::Student),
            })
            .with_insights("- Fractions [stable]: holds up");

        assert_eq!(
            store.load_profile().unwrap().unwrap().name.as_deref(),
            Some("Sam")
        );
        assert_eq!(
            store.recent_insights("anything").unwrap(),
            "- Fractions [stable]: holds up"
        );

        let failing = MemoryStore::new().failing_saves();
        assert!(failing.save_profile(&UserProfile::default()).is_err());
    }
}
