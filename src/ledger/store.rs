//! Case ledger
//!
//! Bans, warnings, strikes, punishment history and blacklisted groups. Every
//! write goes through a `DashMap` entry keyed by the record's primary key, so
//! concurrent writes to one subject are serialized and never interleave.

use crate::ledger::{
    Ban, BlacklistedGroup, HistoryEntry, LedgerResult, Strike, TableFiles, Warning,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

const BANS_TABLE: &str = "bans";
const WARNINGS_TABLE: &str = "warnings";
const STRIKES_TABLE: &str = "strikes";
const HISTORY_TABLE: &str = "history";
const GROUPS_TABLE: &str = "blacklisted_groups";

/// Per-table counters for append-only rows
#[derive(Debug, Default)]
struct Sequences {
    warning: AtomicU64,
    strike: AtomicU64,
    history: AtomicU64,
}

impl Sequences {
    fn next(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Persistent store of moderation cases
#[derive(Debug)]
pub struct Ledger {
    /// subject id -> active ban
    bans: DashMap<u64, Ban>,
    /// subject id -> warnings in insertion order
    warnings: DashMap<u64, Vec<Warning>>,
    /// staff id -> strikes in insertion order
    strikes: DashMap<u64, Vec<Strike>>,
    /// subject id -> history entries in insertion order
    history: DashMap<u64, Vec<HistoryEntry>>,
    /// group id -> blacklist row
    groups: DashMap<u64, BlacklistedGroup>,
    sequences: Sequences,
    files: Arc<TableFiles>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Most recent first, ties broken by insertion sequence
fn newest_first<T>(rows: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, u64)) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

impl Ledger {
    /// Create a ledger that is never written to disk
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_files(Arc::new(TableFiles::in_memory()))
    }

    fn with_files(files: Arc<TableFiles>) -> Self {
        Self {
            bans: DashMap::new(),
            warnings: DashMap::new(),
            strikes: DashMap::new(),
            history: DashMap::new(),
            groups: DashMap::new(),
            sequences: Sequences::default(),
            files,
        }
    }

    /// Load every table from `files`
    ///
    /// # Errors
    /// Returns an error if a table file exists but cannot be read or decoded.
    pub async fn load(files: Arc<TableFiles>) -> LedgerResult<Self> {
        let ledger = Self::with_files(Arc::clone(&files));

        for ban in files.load::<Ban>(BANS_TABLE).await? {
            ledger.bans.insert(ban.subject_id, ban);
        }

        let mut max_warning = 0;
        for warning in files.load::<Warning>(WARNINGS_TABLE).await? {
            max_warning = max_warning.max(warning.id);
            ledger
                .warnings
                .entry(warning.subject_id)
                .or_default()
                .push(warning);
        }

        let mut max_strike = 0;
        for strike in files.load::<Strike>(STRIKES_TABLE).await? {
            max_strike = max_strike.max(strike.id);
            ledger.strikes.entry(strike.staff_id).or_default().push(strike);
        }

        let mut max_history = 0;
        for entry in files.load::<HistoryEntry>(HISTORY_TABLE).await? {
            max_history = max_history.max(entry.id);
            ledger.history.entry(entry.subject_id).or_default().push(entry);
        }

        for group in files.load::<BlacklistedGroup>(GROUPS_TABLE).await? {
            ledger.groups.insert(group.group_id, group);
        }

        ledger.sequences.warning.store(max_warning, Ordering::SeqCst);
        ledger.sequences.strike.store(max_strike, Ordering::SeqCst);
        ledger.sequences.history.store(max_history, Ordering::SeqCst);

        info!(
            bans = ledger.bans.len(),
            warned_subjects = ledger.warnings.len(),
            struck_staff = ledger.strikes.len(),
            blacklisted_groups = ledger.groups.len(),
            "Ledger loaded"
        );

        Ok(ledger)
    }

    async fn save_bans(&self) -> LedgerResult<()> {
        self.files
            .save(BANS_TABLE, || {
                self.bans.iter().map(|e| e.value().clone()).collect()
            })
            .await
    }

    async fn save_warnings(&self) -> LedgerResult<()> {
        self.files
            .save(WARNINGS_TABLE, || {
                self.warnings
                    .iter()
                    .flat_map(|e| e.value().clone())
                    .collect()
            })
            .await
    }

    async fn save_strikes(&self) -> LedgerResult<()> {
        self.files
            .save(STRIKES_TABLE, || {
                self.strikes.iter().flat_map(|e| e.value().clone()).collect()
            })
            .await
    }

    async fn save_history(&self) -> LedgerResult<()> {
        self.files
            .save(HISTORY_TABLE, || {
                self.history.iter().flat_map(|e| e.value().clone()).collect()
            })
            .await
    }

    async fn save_groups(&self) -> LedgerResult<()> {
        self.files
            .save(GROUPS_TABLE, || {
                self.groups.iter().map(|e| e.value().clone()).collect()
            })
            .await
    }

    // ---- bans ----

    /// Put `previous` back in place of `written` after a failed save.
    ///
    /// A row another writer put there in the meantime is left alone.
    fn restore_ban(&self, subject_id: u64, written: Option<&Ban>, previous: Option<Ban>) {
        match (self.bans.entry(subject_id), written, previous) {
            (Entry::Occupied(slot), Some(written), previous) if slot.get() == written => {
                match previous {
                    Some(previous) => {
                        slot.replace_entry(previous);
                    }
                    None => {
                        slot.remove();
                    }
                }
            }
            (Entry::Vacant(slot), None, Some(previous)) => {
                slot.insert(previous);
            }
            _ => {}
        }
    }

    /// Insert or replace the active ban for `ban.subject_id`.
    ///
    /// Returns the ban that was replaced, if any. If the table cannot be
    /// written the previous row is restored.
    pub async fn upsert_ban(&self, ban: Ban) -> LedgerResult<Option<Ban>> {
        let subject_id = ban.subject_id;
        let replaced = self.bans.insert(subject_id, ban.clone());
        if let Err(e) = self.save_bans().await {
            self.restore_ban(subject_id, Some(&ban), replaced);
            return Err(e);
        }
        Ok(replaced)
    }

    /// Get the active ban for a subject
    #[must_use]
    pub fn get_active_ban(&self, subject_id: u64) -> Option<Ban> {
        self.bans.get(&subject_id).map(|ban| ban.clone())
    }

    /// Remove the active ban for a subject, returning it
    pub async fn remove_ban(&self, subject_id: u64) -> LedgerResult<Option<Ban>> {
        let removed = self.bans.remove(&subject_id).map(|(_, ban)| ban);
        if removed.is_some() {
            if let Err(e) = self.save_bans().await {
                self.restore_ban(subject_id, None, removed);
                return Err(e);
            }
        }
        Ok(removed)
    }

    /// Remove `ban` only if it is still the active row for its subject.
    ///
    /// Used by the sweeper so a ban reissued since the scan is left alone.
    /// If the table cannot be written the row is put back, so the next
    /// sweep tries again.
    pub async fn remove_ban_if_unchanged(&self, ban: &Ban) -> LedgerResult<bool> {
        let removed = self
            .bans
            .remove_if(&ban.subject_id, |_, current| current == ban)
            .is_some();
        if removed {
            if let Err(e) = self.save_bans().await {
                self.restore_ban(ban.subject_id, None, Some(ban.clone()));
                return Err(e);
            }
        }
        Ok(removed)
    }

    /// All active bans, oldest first
    #[must_use]
    pub fn list_bans(&self) -> Vec<Ban> {
        let mut bans: Vec<Ban> = self.bans.iter().map(|e| e.value().clone()).collect();
        bans.sort_by_key(|ban| (ban.issued_at, ban.subject_id));
        bans
    }

    /// Delete every ban, returning the removed rows
    pub async fn clear_bans(&self) -> LedgerResult<Vec<Ban>> {
        let subjects: Vec<u64> = self.bans.iter().map(|e| *e.key()).collect();
        let removed: Vec<Ban> = subjects
            .into_iter()
            .filter_map(|subject_id| self.bans.remove(&subject_id).map(|(_, ban)| ban))
            .collect();
        self.save_bans().await?;
        Ok(removed)
    }

    /// Bans with an expiry at or before `now`. Permanent bans never match.
    #[must_use]
    pub fn expired_bans(&self, now: DateTime<Utc>) -> Vec<Ban> {
        self.bans
            .iter()
            .filter(|e| e.value().is_expired_at(now))
            .map(|e| e.value().clone())
            .collect()
    }

    // ---- warnings ----

    /// Append a warning and return it with the subject's new warning count.
    ///
    /// The count is read under the same entry lock as the insert, so it
    /// always includes this warning.
    pub async fn record_warning(&self, mut warning: Warning) -> LedgerResult<(Warning, usize)> {
        warning.id = Sequences::next(&self.sequences.warning);
        let count = {
            let mut rows = self.warnings.entry(warning.subject_id).or_default();
            rows.push(warning.clone());
            rows.len()
        };
        self.save_warnings().await?;
        Ok((warning, count))
    }

    #[must_use]
    pub fn count_warnings(&self, subject_id: u64) -> usize {
        self.warnings.get(&subject_id).map_or(0, |rows| rows.len())
    }

    /// Warnings for a subject, most recent first
    #[must_use]
    pub fn list_warnings(&self, subject_id: u64) -> Vec<Warning> {
        let mut rows = self
            .warnings
            .get(&subject_id)
            .map(|rows| rows.clone())
            .unwrap_or_default();
        newest_first(&mut rows, |w| (w.issued_at, w.id));
        rows
    }

    /// Delete every warning for a subject, returning how many were removed
    pub async fn clear_warnings(&self, subject_id: u64) -> LedgerResult<usize> {
        let removed = self
            .warnings
            .remove(&subject_id)
            .map_or(0, |(_, rows)| rows.len());
        if removed > 0 {
            self.save_warnings().await?;
        }
        Ok(removed)
    }

    // ---- strikes ----

    /// Append a strike and return it with the staff member's new strike count
    pub async fn record_strike(&self, mut strike: Strike) -> LedgerResult<(Strike, usize)> {
        strike.id = Sequences::next(&self.sequences.strike);
        let count = {
            let mut rows = self.strikes.entry(strike.staff_id).or_default();
            rows.push(strike.clone());
            rows.len()
        };
        self.save_strikes().await?;
        Ok((strike, count))
    }

    #[must_use]
    pub fn count_strikes(&self, staff_id: u64) -> usize {
        self.strikes.get(&staff_id).map_or(0, |rows| rows.len())
    }

    /// Strikes against a staff member, most recent first
    #[must_use]
    pub fn list_strikes(&self, staff_id: u64) -> Vec<Strike> {
        let mut rows = self
            .strikes
            .get(&staff_id)
            .map(|rows| rows.clone())
            .unwrap_or_default();
        newest_first(&mut rows, |s| (s.issued_at, s.id));
        rows
    }

    // ---- history ----

    /// Append an entry to the punishment history
    pub async fn append_history(&self, mut entry: HistoryEntry) -> LedgerResult<HistoryEntry> {
        entry.id = Sequences::next(&self.sequences.history);
        self.history
            .entry(entry.subject_id)
            .or_default()
            .push(entry.clone());
        self.save_history().await?;
        Ok(entry)
    }

    /// History for a subject, most recent first
    #[must_use]
    pub fn list_history(&self, subject_id: u64) -> Vec<HistoryEntry> {
        let mut rows = self
            .history
            .get(&subject_id)
            .map(|rows| rows.clone())
            .unwrap_or_default();
        newest_first(&mut rows, |h| (h.timestamp, h.id));
        rows
    }

    /// Up to `limit` entries recorded by one moderator, most recent first
    #[must_use]
    pub fn list_history_by_moderator(&self, staff_id: u64, limit: usize) -> Vec<HistoryEntry> {
        let mut rows: Vec<HistoryEntry> = self
            .history
            .iter()
            .flat_map(|e| {
                e.value()
                    .iter()
                    .filter(|h| h.moderator.staff_id() == Some(staff_id))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        newest_first(&mut rows, |h| (h.timestamp, h.id));
        rows.truncate(limit);
        rows
    }

    // ---- blacklisted groups ----

    /// Insert or replace a blacklisted group
    pub async fn blacklist_group(&self, group: BlacklistedGroup) -> LedgerResult<()> {
        self.groups.insert(group.group_id, group);
        self.save_groups().await
    }

    /// Remove a group from the blacklist, returning whether it was present
    pub async fn remove_blacklisted_group(&self, group_id: u64) -> LedgerResult<bool> {
        let removed = self.groups.remove(&group_id).is_some();
        if removed {
            self.save_groups().await?;
        }
        Ok(removed)
    }

    #[must_use]
    pub fn is_group_blacklisted(&self, group_id: u64) -> bool {
        self.groups.contains_key(&group_id)
    }

    /// All blacklisted groups, oldest first
    #[must_use]
    pub fn list_blacklisted_groups(&self) -> Vec<BlacklistedGroup> {
        let mut groups: Vec<BlacklistedGroup> =
            self.groups.iter().map(|e| e.value().clone()).collect();
        groups.sort_by_key(|g| (g.blacklisted_at, g.group_id));
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Actor, PunishmentKind};
    use chrono::Duration;

    fn warning(subject_id: u64) -> Warning {
        Warning::new(subject_id, "player", "rdm", "clip", Actor::Staff(10))
    }

    #[tokio::test]
    async fn test_ban_upsert_overwrites() {
        let ledger = Ledger::in_memory();
        ledger
            .upsert_ban(Ban::new(1, "player", "first", "a", Actor::Staff(10), None))
            .await
            .unwrap();

        let expires = Utc::now() + Duration::days(1);
        let replaced = ledger
            .upsert_ban(Ban::new(1, "player", "second", "b", Actor::Staff(11), Some(expires)))
            .await
            .unwrap();

        assert_eq!(replaced.unwrap().reason, "first");
        assert_eq!(ledger.list_bans().len(), 1);
        let ban = ledger.get_active_ban(1).unwrap();
        assert_eq!(ban.reason, "second");
        assert_eq!(ban.proof, "b");
        assert_eq!(ban.issued_by, Actor::Staff(11));
        assert_eq!(ban.expires_at, Some(expires));
    }

    #[tokio::test]
    async fn test_concurrent_bans_leave_one_row() {
        let ledger = Arc::new(Ledger::in_memory());
        let mut tasks = Vec::new();
        for moderator in 0..16u64 {
            let ledger = Arc::clone(&ledger);
            tasks.push(tokio::spawn(async move {
                let reason = format!("reason-{moderator}");
                ledger
                    .upsert_ban(Ban::new(7, "player", reason, "p", Actor::Staff(moderator), None))
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(ledger.list_bans().len(), 1);
        let ban = ledger.get_active_ban(7).unwrap();
        let moderator = ban.issued_by.staff_id().unwrap();
        assert_eq!(ban.reason, format!("reason-{moderator}"));
    }

    #[tokio::test]
    async fn test_remove_ban() {
        let ledger = Ledger::in_memory();
        ledger
            .upsert_ban(Ban::new(1, "player", "r", "p", Actor::Staff(10), None))
            .await
            .unwrap();

        assert!(ledger.remove_ban(1).await.unwrap().is_some());
        assert!(ledger.get_active_ban(1).is_none());
        assert!(ledger.remove_ban(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_ban_if_unchanged() {
        let ledger = Ledger::in_memory();
        let old = Ban::new(1, "player", "old", "p", Actor::Staff(10), None);
        ledger.upsert_ban(old.clone()).await.unwrap();
        ledger
            .upsert_ban(Ban::new(1, "player", "new", "p", Actor::Staff(10), None))
            .await
            .unwrap();

        assert!(!ledger.remove_ban_if_unchanged(&old).await.unwrap());
        assert_eq!(ledger.get_active_ban(1).unwrap().reason, "new");
    }

    #[tokio::test]
    async fn test_expired_bans() {
        let ledger = Ledger::in_memory();
        let now = Utc::now();
        ledger
            .upsert_ban(Ban::new(
                1,
                "expired",
                "r",
                "p",
                Actor::Staff(10),
                Some(now - Duration::milliseconds(1)),
            ))
            .await
            .unwrap();
        ledger
            .upsert_ban(Ban::new(
                2,
                "active",
                "r",
                "p",
                Actor::Staff(10),
                Some(now + Duration::hours(1)),
            ))
            .await
            .unwrap();
        ledger
            .upsert_ban(Ban::new(3, "permanent", "r", "p", Actor::Staff(10), None))
            .await
            .unwrap();

        let expired = ledger.expired_bans(now);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].subject_id, 1);
    }

    #[tokio::test]
    async fn test_clear_bans() {
        let ledger = Ledger::in_memory();
        for subject in 1..=3 {
            ledger
                .upsert_ban(Ban::new(subject, "p", "r", "p", Actor::Staff(10), None))
                .await
                .unwrap();
        }
        let removed = ledger.clear_bans().await.unwrap();
        assert_eq!(removed.len(), 3);
        assert!(ledger.list_bans().is_empty());
    }

    #[tokio::test]
    async fn test_warning_counts_and_order() {
        let ledger = Ledger::in_memory();
        let (first, count) = ledger.record_warning(warning(1)).await.unwrap();
        assert_eq!(count, 1);
        let (second, count) = ledger.record_warning(warning(1)).await.unwrap();
        assert_eq!(count, 2);
        assert!(second.id > first.id);

        ledger.record_warning(warning(2)).await.unwrap();

        assert_eq!(ledger.count_warnings(1), 2);
        assert_eq!(ledger.count_warnings(2), 1);
        assert_eq!(ledger.count_warnings(3), 0);

        let listed = ledger.list_warnings(1);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn test_clear_warnings_only_touches_subject() {
        let ledger = Ledger::in_memory();
        for _ in 0..4 {
            ledger.record_warning(warning(1)).await.unwrap();
        }
        ledger.record_warning(warning(2)).await.unwrap();

        assert_eq!(ledger.clear_warnings(1).await.unwrap(), 4);
        assert_eq!(ledger.count_warnings(1), 0);
        assert_eq!(ledger.count_warnings(2), 1);
        assert_eq!(ledger.clear_warnings(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_strikes() {
        let ledger = Ledger::in_memory();
        for expected in 1..=3 {
            let (_, count) = ledger
                .record_strike(Strike::new(50, "late", "log", Actor::Staff(1)))
                .await
                .unwrap();
            assert_eq!(count, expected);
        }
        assert_eq!(ledger.count_strikes(50), 3);
        assert_eq!(ledger.count_strikes(51), 0);
        assert_eq!(ledger.list_strikes(50).len(), 3);
    }

    #[tokio::test]
    async fn test_history_queries() {
        let ledger = Ledger::in_memory();
        for (subject, moderator) in [(1, 10), (1, 11), (2, 10), (3, 10)] {
            ledger
                .append_history(HistoryEntry::new(
                    subject,
                    "player",
                    PunishmentKind::Kick,
                    "r",
                    "p",
                    Actor::Staff(moderator),
                ))
                .await
                .unwrap();
        }

        let history = ledger.list_history(1);
        assert_eq!(history.len(), 2);
        assert!(history[0].id > history[1].id);

        let by_moderator = ledger.list_history_by_moderator(10, 2);
        assert_eq!(by_moderator.len(), 2);
        assert!(by_moderator.iter().all(|h| h.moderator == Actor::Staff(10)));
        assert!(by_moderator[0].id > by_moderator[1].id);

        assert_eq!(ledger.list_history_by_moderator(10, 25).len(), 3);
        assert!(ledger.list_history_by_moderator(99, 25).is_empty());
    }

    #[tokio::test]
    async fn test_blacklisted_groups() {
        let ledger = Ledger::in_memory();
        ledger
            .blacklist_group(BlacklistedGroup {
                group_id: 123,
                blacklisted_by: Actor::Staff(1),
                blacklisted_at: Utc::now(),
            })
            .await
            .unwrap();

        assert!(ledger.is_group_blacklisted(123));
        assert_eq!(ledger.list_blacklisted_groups().len(), 1);
        assert!(ledger.remove_blacklisted_group(123).await.unwrap());
        assert!(!ledger.remove_blacklisted_group(123).await.unwrap());
        assert!(ledger.list_blacklisted_groups().is_empty());
    }

    #[tokio::test]
    async fn test_failed_ban_writes_leave_table_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let ledger = Ledger::load(Arc::new(TableFiles::new(&data_dir)))
            .await
            .unwrap();
        let first = Ban::new(1, "player", "first", "a", Actor::Staff(10), None);
        ledger.upsert_ban(first.clone()).await.unwrap();

        std::fs::remove_dir_all(&data_dir).unwrap();
        std::fs::write(&data_dir, "not a directory").unwrap();

        let second = Ban::new(1, "player", "second", "b", Actor::Staff(11), None);
        assert!(ledger.upsert_ban(second).await.is_err());
        assert_eq!(ledger.get_active_ban(1), Some(first.clone()));

        let fresh = Ban::new(2, "other", "r", "p", Actor::Staff(10), None);
        assert!(ledger.upsert_ban(fresh).await.is_err());
        assert!(ledger.get_active_ban(2).is_none());

        assert!(ledger.remove_ban(1).await.is_err());
        assert!(ledger.remove_ban_if_unchanged(&first).await.is_err());
        assert_eq!(ledger.list_bans(), vec![first]);
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(TableFiles::new(dir.path()));

        {
            let ledger = Ledger::load(Arc::clone(&files)).await.unwrap();
            ledger
                .upsert_ban(Ban::new(1, "player", "r", "p", Actor::Staff(10), None))
                .await
                .unwrap();
            ledger.record_warning(warning(1)).await.unwrap();
            ledger.record_warning(warning(1)).await.unwrap();
            ledger
                .record_strike(Strike::new(50, "late", "log", Actor::System))
                .await
                .unwrap();
            ledger
                .append_history(HistoryEntry::new(
                    1,
                    "player",
                    PunishmentKind::Ban,
                    "r",
                    "p",
                    Actor::Staff(10),
                ))
                .await
                .unwrap();
        }

        let reloaded = Ledger::load(files).await.unwrap();
        assert!(reloaded.get_active_ban(1).is_some());
        assert_eq!(reloaded.count_warnings(1), 2);
        assert_eq!(reloaded.count_strikes(50), 1);
        assert_eq!(reloaded.list_history(1).len(), 1);

        // Sequences continue after the highest stored id
        let (next, _) = reloaded.record_warning(warning(1)).await.unwrap();
        assert_eq!(next.id, 3);
    }
}
