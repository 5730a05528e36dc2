//! Challenge completion tracking across two storage tiers.
//!
//! Anonymous learners keep their progress in a local [`KeyValueStore`];
//! signed-in learners keep it on their account through [`ProgressApi`].
//! Both tiers implement [`ProgressStore`], and [`ProgressTracker`] picks
//! one from the current authentication state. On every sign-in, local
//! completions are pushed to the account and local storage is cleared,
//! so the account is the only source of truth while signed in.
//!
//! Reads never fail: storage and API errors are logged and surface as an
//! empty set or `None`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::model::ProgressUpsert;
use crate::storage::KeyValueStore;
use crate::traits::ProgressApi;

/// App identity used to namespace local storage keys.
pub const DEFAULT_APP_ID: &str = "gelly-fish";

/// The two local storage keys of one app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    /// JSON array of completed challenge ids.
    pub completed: String,
    /// JSON object mapping challenge id to solution text.
    pub solutions: String,
}

impl StorageKeys {
    pub fn for_app(app_id: &str) -> Self {
        Self {
            completed: format!("{app_id}-completed-challenges"),
            solutions: format!("{app_id}-challenge-solutions"),
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::for_app(DEFAULT_APP_ID)
    }
}

/// Where completion state lives for one learner.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Ids of completed challenges.
    async fn completed_challenges(&self) -> BTreeSet<String>;

    /// The solution recorded for a challenge.
    async fn solution(&self, challenge_id: &str) -> Option<String>;

    /// Record a challenge as completed, with the query that solved it.
    ///
    /// The local store accepts a completion without a solution. The
    /// account store rejects one and writes nothing, so callers that may
    /// lack a solution should mark completion before signing in.
    async fn mark_completed(&self, challenge_id: &str, solution: Option<&str>)
        -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Local tier
// ---------------------------------------------------------------------------

/// Progress of an anonymous learner, kept in local storage.
pub struct LocalProgressStore {
    store: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
}

impl LocalProgressStore {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: StorageKeys) -> Self {
        Self { store, keys }
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn read_completed(&self) -> Result<BTreeSet<String>, StorageError> {
        match self.store.get(&self.keys.completed)? {
            Some(raw) => Ok(serde_json::from_str::<Vec<String>>(&raw)?
                .into_iter()
                .collect()),
            None => Ok(BTreeSet::new()),
        }
    }

    pub fn read_solutions(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match self.store.get(&self.keys.solutions)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(BTreeMap::new()),
        }
    }

    pub fn save_completed(&self, challenge_id: &str) -> Result<(), StorageError> {
        let mut completed = self.read_completed()?;
        if completed.insert(challenge_id.to_string()) {
            let ids: Vec<&String> = completed.iter().collect();
            self.store
                .set(&self.keys.completed, &serde_json::to_string(&ids)?)?;
        }
        Ok(())
    }

    pub fn save_solution(&self, challenge_id: &str, solution: &str) -> Result<(), StorageError> {
        let mut solutions = self.read_solutions()?;
        solutions.insert(challenge_id.to_string(), solution.to_string());
        self.store
            .set(&self.keys.solutions, &serde_json::to_string(&solutions)?)
    }

    /// Remove both keys.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(&self.keys.completed)?;
        self.store.remove(&self.keys.solutions)
    }
}

#[async_trait]
impl ProgressStore for LocalProgressStore {
    async fn completed_challenges(&self) -> BTreeSet<String> {
        self.read_completed().unwrap_or_else(|e| {
            tracing::error!("error reading completed challenges from storage: {e}");
            BTreeSet::new()
        })
    }

    async fn solution(&self, challenge_id: &str) -> Option<String> {
        match self.read_solutions() {
            Ok(mut solutions) => solutions.remove(challenge_id).filter(|s| !s.is_empty()),
            Err(e) => {
                tracing::error!("error reading solution from storage: {e}");
                None
            }
        }
    }

    async fn mark_completed(
        &self,
        challenge_id: &str,
        solution: Option<&str>,
    ) -> anyhow::Result<()> {
        if let Err(e) = self.save_completed(challenge_id) {
            tracing::error!("error saving completed challenge to storage: {e}");
        }
        if let Some(solution) = solution {
            if let Err(e) = self.save_solution(challenge_id, solution) {
                tracing::error!("error saving solution to storage: {e}");
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Account tier
// ---------------------------------------------------------------------------

/// Progress of a signed-in learner, kept on their account.
pub struct AccountProgressStore {
    api: Arc<dyn ProgressApi>,
    user_id: String,
}

impl AccountProgressStore {
    pub fn new(api: Arc<dyn ProgressApi>, user_id: impl Into<String>) -> Self {
        Self {
            api,
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[async_trait]
impl ProgressStore for AccountProgressStore {
    async fn completed_challenges(&self) -> BTreeSet<String> {
        match self.api.completed_challenge_ids(&self.user_id).await {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                tracing::error!("error fetching completed challenges from API: {e:#}");
                BTreeSet::new()
            }
        }
    }

    async fn solution(&self, challenge_id: &str) -> Option<String> {
        match self.api.find_solution(challenge_id, &self.user_id).await {
            Ok(solution) => solution.filter(|s| !s.is_empty()),
            Err(e) => {
                tracing::error!("error fetching solution from API: {e:#}");
                None
            }
        }
    }

    async fn mark_completed(
        &self,
        challenge_id: &str,
        solution: Option<&str>,
    ) -> anyhow::Result<()> {
        let solution = solution.filter(|s| !s.trim().is_empty()).with_context(|| {
            format!("a solution is required to record challenge {challenge_id} on an account")
        })?;
        self.api
            .upsert_progress(&ProgressUpsert::completed(
                challenge_id,
                &self.user_id,
                solution,
            ))
            .await
            .with_context(|| format!("failed to save progress for challenge {challenge_id}"))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reconciliation on sign-in
// ---------------------------------------------------------------------------

/// Result of pushing local progress to an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// Whether at least one challenge was pushed.
    pub synced: bool,
    /// Number of challenges pushed.
    pub count: usize,
    /// Challenges whose push failed; they stay in local storage.
    pub failed: Vec<String>,
    /// Completed challenges without a stored solution; they are dropped.
    pub skipped: Vec<String>,
}

/// Push every local completion to `user_id`'s account, then clear local
/// storage.
///
/// Upserts are keyed on `(challenge, user)`, so running this twice cannot
/// duplicate records. Challenges whose upsert fails are written back to
/// local storage and retried on the next sign-in.
pub async fn sync_local_to_account(
    local: &LocalProgressStore,
    api: &dyn ProgressApi,
    user_id: &str,
) -> SyncOutcome {
    let completed = local.completed_challenges().await;
    if completed.is_empty() {
        return SyncOutcome::default();
    }
    let solutions = local.read_solutions().unwrap_or_else(|e| {
        tracing::error!("error reading solutions from storage: {e}");
        BTreeMap::new()
    });

    let mut outcome = SyncOutcome::default();
    let mut unsynced = Vec::new();

    for challenge_id in &completed {
        let Some(solution) = solutions.get(challenge_id).filter(|s| !s.is_empty()) else {
            tracing::warn!(challenge = %challenge_id, "no stored solution, not syncing");
            outcome.skipped.push(challenge_id.clone());
            continue;
        };

        let input = ProgressUpsert::completed(challenge_id, user_id, solution);
        match api.upsert_progress(&input).await {
            Ok(_) => outcome.count += 1,
            Err(e) => {
                tracing::error!(challenge = %challenge_id, "error syncing challenge: {e:#}");
                outcome.failed.push(challenge_id.clone());
                unsynced.push((challenge_id, solution));
            }
        }
    }

    if let Err(e) = local.clear() {
        tracing::error!("error clearing progress from storage: {e}");
    }
    for (challenge_id, solution) in unsynced {
        let restored = local
            .save_completed(challenge_id)
            .and_then(|_| local.save_solution(challenge_id, solution));
        if let Err(e) = restored {
            tracing::error!(challenge = %challenge_id, "error restoring unsynced challenge: {e}");
        }
    }

    outcome.synced = outcome.count > 0;
    tracing::info!(
        user = %user_id,
        count = outcome.count,
        failed = outcome.failed.len(),
        skipped = outcome.skipped.len(),
        "synced local progress to account"
    );
    outcome
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TrackerState {
    user_id: Option<String>,
    completed: BTreeSet<String>,
}

/// Completion state of the current learner.
///
/// Selects the local or account store from the sign-in state, caches the
/// completed set, and migrates local progress to the account on each
/// sign-in.
pub struct ProgressTracker {
    local: Arc<LocalProgressStore>,
    api: Arc<dyn ProgressApi>,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    /// A tracker for an anonymous learner.
    pub fn new(local: Arc<LocalProgressStore>, api: Arc<dyn ProgressApi>) -> Self {
        Self {
            local,
            api,
            state: Mutex::new(TrackerState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn user_id(&self) -> Option<String> {
        self.state().user_id.clone()
    }

    /// The store for the current sign-in state.
    pub fn store(&self) -> Arc<dyn ProgressStore> {
        match self.user_id() {
            Some(user_id) => Arc::new(AccountProgressStore::new(Arc::clone(&self.api), user_id)),
            None => Arc::clone(&self.local) as Arc<dyn ProgressStore>,
        }
    }

    /// The last loaded completed set.
    pub fn completed(&self) -> BTreeSet<String> {
        self.state().completed.clone()
    }

    pub fn is_completed(&self, challenge_id: &str) -> bool {
        self.state().completed.contains(challenge_id)
    }

    /// Reload the completed set from the current store.
    pub async fn refresh(&self) -> BTreeSet<String> {
        let completed = self.store().completed_challenges().await;
        self.state().completed = completed.clone();
        completed
    }

    /// Switch to `user_id`'s account, pushing any local completions to it.
    ///
    /// Local storage is empty after a successful push, so repeated
    /// sign-ins only carry over progress made while signed out and
    /// challenges whose earlier push failed.
    pub async fn sign_in(&self, user_id: &str) -> SyncOutcome {
        self.state().user_id = Some(user_id.to_string());
        let outcome = sync_local_to_account(&self.local, self.api.as_ref(), user_id).await;
        self.refresh().await;
        outcome
    }

    /// Go back to anonymous, local-only progress.
    pub async fn sign_out(&self) {
        self.state().user_id = None;
        self.refresh().await;
    }

    /// Record a completion. The completed set is updated before the store
    /// write and reloaded after it, whether the write succeeded or not.
    pub async fn mark_completed(
        &self,
        challenge_id: &str,
        solution: Option<&str>,
    ) -> anyhow::Result<()> {
        self.state().completed.insert(challenge_id.to_string());

        let result = self.store().mark_completed(challenge_id, solution).await;
        if let Err(e) = &result {
            tracing::error!("error marking challenge as completed: {e:#}");
        }

        self.refresh().await;
        result
    }

    /// The recorded solution for a challenge in the current store.
    pub async fn solution(&self, challenge_id: &str) -> Option<String> {
        self.store().solution(challenge_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    use crate::model::ProgressRecord;
    use crate::storage::MemoryStore;

    /// Account records keyed on (challenge, user); challenges listed in
    /// `failing` reject upserts.
    #[derive(Default)]
    struct FakeAccounts {
        records: Mutex<HashMap<(String, String), ProgressRecord>>,
        failing: HashSet<String>,
    }

    #[async_trait]
    impl ProgressApi for FakeAccounts {
        async fn upsert_progress(&self, input: &ProgressUpsert) -> anyhow::Result<ProgressRecord> {
            if self.failing.contains(&input.challenge_id) {
                anyhow::bail!("backend unavailable");
            }
            let mut records = self.records.lock().unwrap();
            let key = (input.challenge_id.clone(), input.user_id.clone());
            let next_id = records.len() + 1;
            let record = records.entry(key).or_insert_with(|| ProgressRecord {
                id: next_id.to_string(),
                challenge_id: input.challenge_id.clone(),
                user_id: input.user_id.clone(),
                is_complete: false,
                solution: String::new(),
            });
            record.is_complete = input.is_complete;
            record.solution = input.solution.clone();
            Ok(record.clone())
        }

        async fn completed_challenge_ids(&self, user_id: &str) -> anyhow::Result<Vec<String>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .values()
                .filter(|r| r.user_id == user_id && r.is_complete)
                .map(|r| r.challenge_id.clone())
                .collect())
        }

        async fn find_solution(
            &self,
            challenge_id: &str,
            user_id: &str,
        ) -> anyhow::Result<Option<String>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .get(&(challenge_id.to_string(), user_id.to_string()))
                .filter(|r| r.is_complete)
                .map(|r| r.solution.clone()))
        }
    }

    fn local() -> Arc<LocalProgressStore> {
        Arc::new(LocalProgressStore::new(
            Arc::new(MemoryStore::new()),
            StorageKeys::default(),
        ))
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn storage_keys_are_namespaced() {
        let keys = StorageKeys::default();
        assert_eq!(keys.completed, "gelly-fish-completed-challenges");
        assert_eq!(keys.solutions, "gelly-fish-challenge-solutions");
    }

    #[tokio::test]
    async fn local_store_records_completion_and_solution() {
        let local = local();
        local.mark_completed("A", Some("view { a }")).await.unwrap();
        local.mark_completed("B", None).await.unwrap();
        local.mark_completed("A", Some("view { a2 }")).await.unwrap();

        assert_eq!(local.completed_challenges().await, set(&["A", "B"]));
        assert_eq!(local.solution("A").await.as_deref(), Some("view { a2 }"));
        assert_eq!(local.solution("B").await, None);
    }

    #[tokio::test]
    async fn corrupt_local_storage_reads_as_empty() {
        let store = Arc::new(MemoryStore::new());
        let keys = StorageKeys::default();
        store.set(&keys.completed, "{not json").unwrap();
        let local = LocalProgressStore::new(store, keys);
        assert!(local.completed_challenges().await.is_empty());
    }

    #[tokio::test]
    async fn account_store_requires_solution() {
        let api = Arc::new(FakeAccounts::default());
        let account = AccountProgressStore::new(api.clone(), "u1");
        assert!(account.mark_completed("A", None).await.is_err());
        account.mark_completed("A", Some("view { a }")).await.unwrap();
        assert_eq!(account.completed_challenges().await, set(&["A"]));
    }

    #[tokio::test]
    async fn sign_in_pushes_local_progress_and_clears_it() {
        let local = local();
        local.mark_completed("A", Some("view { a }")).await.unwrap();
        local.mark_completed("B", Some("view { b }")).await.unwrap();
        let api = Arc::new(FakeAccounts::default());

        let tracker = ProgressTracker::new(local.clone(), api.clone());
        assert_eq!(tracker.refresh().await, set(&["A", "B"]));

        let outcome = tracker.sign_in("u1").await;
        assert!(outcome.synced);
        assert_eq!(outcome.count, 2);

        assert_eq!(
            api.completed_challenge_ids("u1").await.unwrap().len(),
            2
        );
        assert_eq!(tracker.completed(), set(&["A", "B"]));
        assert!(local.read_completed().unwrap().is_empty());
        assert!(local.read_solutions().unwrap().is_empty());
        assert_eq!(tracker.solution("B").await.as_deref(), Some("view { b }"));
    }

    #[tokio::test]
    async fn returning_user_gets_progress_made_while_signed_out() {
        let local = local();
        let api = Arc::new(FakeAccounts::default());
        let tracker = ProgressTracker::new(local.clone(), api.clone());

        tracker.sign_in("u1").await;
        tracker.sign_out().await;

        local.mark_completed("C", Some("view { c }")).await.unwrap();
        let outcome = tracker.sign_in("u1").await;
        assert_eq!(outcome.count, 1);
        assert!(local.read_completed().unwrap().is_empty());
        assert_eq!(api.completed_challenge_ids("u1").await.unwrap(), vec!["C".to_string()]);
        assert_eq!(tracker.completed(), set(&["C"]));

        // nothing left locally, so the next sign-in pushes nothing
        tracker.sign_out().await;
        let again = tracker.sign_in("u1").await;
        assert_eq!(again, SyncOutcome::default());
    }

    #[tokio::test]
    async fn failed_pushes_stay_local_and_missing_solutions_are_dropped() {
        let local = local();
        local.mark_completed("A", Some("view { a }")).await.unwrap();
        local.mark_completed("B", Some("view { b }")).await.unwrap();
        local.mark_completed("C", None).await.unwrap();
        let api = Arc::new(FakeAccounts {
            failing: ["B".to_string()].into_iter().collect(),
            ..Default::default()
        });

        let outcome = sync_local_to_account(&local, api.as_ref(), "u1").await;
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.failed, vec!["B".to_string()]);
        assert_eq!(outcome.skipped, vec!["C".to_string()]);
        assert_eq!(local.read_completed().unwrap(), set(&["B"]));
        assert_eq!(local.solution("B").await.as_deref(), Some("view { b }"));
    }

    #[tokio::test]
    async fn nothing_to_sync() {
        let api = FakeAccounts::default();
        let outcome = sync_local_to_account(&local(), &api, "u1").await;
        assert!(!outcome.synced);
        assert_eq!(outcome.count, 0);
    }

    #[tokio::test]
    async fn signed_in_completion_goes_to_account_only() {
        let local = local();
        let api = Arc::new(FakeAccounts::default());
        let tracker = ProgressTracker::new(local.clone(), api.clone());
        tracker.sign_in("u1").await;

        tracker
            .mark_completed("A", Some("view { a }"))
            .await
            .unwrap();
        assert!(tracker.is_completed("A"));
        assert!(local.read_completed().unwrap().is_empty());

        // a failed write is reported and the optimistic entry rolled back
        assert!(tracker.mark_completed("B", None).await.is_err());
        assert!(!tracker.is_completed("B"));
    }
}
