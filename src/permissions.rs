//! Staff ranks and permission checks
//!
//! The rank store maps a staff member's chat identity to one of four ordered
//! ranks. The configured super-admin passes every check whether or not they
//! have a row.

use crate::ledger::{Actor, LedgerResult, TableFiles};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

const STAFF_TABLE: &str = "staff";

/// Staff privilege tier, ordered moderator < admin < manager < owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Moderator,
    Admin,
    Manager,
    Owner,
}

impl Rank {
    /// Numeric tier used for comparisons
    #[must_use]
    pub fn tier(self) -> u8 {
        match self {
            Self::Moderator => 1,
            Self::Admin => 2,
            Self::Manager => 3,
            Self::Owner => 4,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Moderator => "moderator",
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Owner => "owner",
        }
    }

    pub const ALL: [Self; 4] = [Self::Moderator, Self::Admin, Self::Manager, Self::Owner];
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "moderator" => Ok(Self::Moderator),
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "owner" => Ok(Self::Owner),
            other => Err(format!("unknown rank: {other}")),
        }
    }
}

/// A whitelisted staff member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: u64,
    pub rank: Rank,
    pub granted_by: Actor,
    pub granted_at: DateTime<Utc>,
}

/// Persistent staff identity -> rank mapping
#[derive(Debug)]
pub struct RankStore {
    staff: DashMap<u64, StaffMember>,
    files: Arc<TableFiles>,
}

impl Default for RankStore {
    fn default() -> Self {
        Self {
            staff: DashMap::new(),
            files: Arc::new(TableFiles::in_memory()),
        }
    }
}

impl RankStore {
    /// Load the staff table
    ///
    /// # Errors
    /// Returns an error if the table file cannot be read or decoded.
    pub async fn load(files: Arc<TableFiles>) -> LedgerResult<Self> {
        let staff = DashMap::new();
        for member in files.load::<StaffMember>(STAFF_TABLE).await? {
            staff.insert(member.id, member);
        }
        Ok(Self { staff, files })
    }

    async fn save(&self) -> LedgerResult<()> {
        self.files
            .save(STAFF_TABLE, || {
                let mut rows: Vec<StaffMember> =
                    self.staff.iter().map(|e| e.value().clone()).collect();
                rows.sort_by_key(|m| (m.granted_at, m.id));
                rows
            })
            .await
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<StaffMember> {
        self.staff.get(&id).map(|m| m.clone())
    }

    #[must_use]
    pub fn rank_of(&self, id: u64) -> Option<Rank> {
        self.staff.get(&id).map(|m| m.rank)
    }

    /// Grant or replace a staff member's rank
    pub async fn grant(&self, id: u64, rank: Rank, granted_by: Actor) -> LedgerResult<StaffMember> {
        let member = StaffMember {
            id,
            rank,
            granted_by,
            granted_at: Utc::now(),
        };
        self.staff.insert(id, member.clone());
        self.save().await?;
        info!(staff_id = id, rank = %rank, granted_by = %granted_by, "Staff rank granted");
        Ok(member)
    }

    /// Grant a rank only if the identity has none yet
    pub async fn grant_if_absent(
        &self,
        id: u64,
        rank: Rank,
        granted_by: Actor,
    ) -> LedgerResult<bool> {
        let inserted = match self.staff.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(StaffMember {
                    id,
                    rank,
                    granted_by,
                    granted_at: Utc::now(),
                });
                true
            }
        };
        if inserted {
            self.save().await?;
        }
        Ok(inserted)
    }

    /// Remove a staff member, returning their row if they had one
    pub async fn revoke(&self, id: u64) -> LedgerResult<Option<StaffMember>> {
        let removed = self.staff.remove(&id).map(|(_, m)| m);
        if removed.is_some() {
            self.save().await?;
            info!(staff_id = id, "Staff rank revoked");
        }
        Ok(removed)
    }

    /// All staff members, earliest grant first
    #[must_use]
    pub fn list(&self) -> Vec<StaffMember> {
        let mut rows: Vec<StaffMember> = self.staff.iter().map(|e| e.value().clone()).collect();
        rows.sort_by_key(|m| (m.granted_at, m.id));
        rows
    }
}

/// Permission evaluator over a rank store
#[derive(Debug)]
pub struct Permissions {
    super_admin: u64,
    ranks: Arc<RankStore>,
}

impl Permissions {
    pub fn new(super_admin: u64, ranks: Arc<RankStore>) -> Self {
        Self { super_admin, ranks }
    }

    #[must_use]
    pub fn super_admin(&self) -> u64 {
        self.super_admin
    }

    #[must_use]
    pub fn ranks(&self) -> &Arc<RankStore> {
        &self.ranks
    }

    /// Effective rank of an actor; the super-admin is always an owner
    #[must_use]
    pub fn rank_of(&self, actor: u64) -> Option<Rank> {
        if actor == self.super_admin {
            return Some(Rank::Owner);
        }
        self.ranks.rank_of(actor)
    }

    /// Check whether `actor` holds at least `required`
    #[must_use]
    pub fn authorize(&self, actor: u64, required: Rank) -> bool {
        if actor == self.super_admin {
            return true;
        }
        self.ranks
            .rank_of(actor)
            .is_some_and(|rank| rank.tier() >= required.tier())
    }
}
