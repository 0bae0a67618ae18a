//! # Voting Engine
//!
//! A voter holds at most one of {like, dislike} on a message. Repeating the
//! same vote clears it; choosing the other one swaps it. Counts are never
//! stored on their own here, they are the sizes of the voter sets.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::models::{AuthorId, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Like,
    Dislike,
}

impl VoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteKind::Like => "like",
            VoteKind::Dislike => "dislike",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            VoteKind::Like => VoteKind::Dislike,
            VoteKind::Dislike => VoteKind::Like,
        }
    }
}

impl fmt::Display for VoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(VoteKind::Like),
            "dislike" => Ok(VoteKind::Dislike),
            other => Err(DomainError::validation(format!(
                "invalid vote type {other:?}, expected \"like\" or \"dislike\""
            ))),
        }
    }
}

/// What a single toggle did to the voter's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteOutcome {
    /// No previous vote; the requested one is now active.
    Cast,
    /// The opposite vote was replaced by the requested one.
    Switched,
    /// The same vote was active and has been withdrawn.
    Cleared,
}

impl VoteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteOutcome::Cast => "cast",
            VoteOutcome::Switched => "switched",
            VoteOutcome::Cleared => "cleared",
        }
    }
}

/// Result of an atomic vote against the store.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteReceipt {
    pub message: Message,
    pub outcome: VoteOutcome,
}

/// Like/dislike voter sets of one message.
///
/// The two sets are private so the mutual-exclusion invariant can only be
/// changed through [`VoteTally::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "VoteTallyRecord", try_from = "VoteTallyRecord")]
pub struct VoteTally {
    likes: BTreeSet<AuthorId>,
    dislikes: BTreeSet<AuthorId>,
}

impl VoteTally {
    /// Rebuilds a tally from persisted sets, rejecting a voter present in both.
    pub fn from_sets(
        likes: BTreeSet<AuthorId>,
        dislikes: BTreeSet<AuthorId>,
    ) -> Result<Self, DomainError> {
        if let Some(voter) = likes.intersection(&dislikes).next() {
            return Err(DomainError::Storage(format!(
                "voter {voter} holds both a like and a dislike"
            )));
        }
        Ok(Self { likes, dislikes })
    }

    /// Toggles `voter`'s `kind` vote.
    pub fn apply(&mut self, voter: &AuthorId, kind: VoteKind) -> VoteOutcome {
        if self.voters(kind).contains(voter) {
            self.voters_mut(kind).remove(voter);
            return VoteOutcome::Cleared;
        }
        let had_opposite = self.voters_mut(kind.opposite()).remove(voter);
        self.voters_mut(kind).insert(voter.clone());
        if had_opposite {
            VoteOutcome::Switched
        } else {
            VoteOutcome::Cast
        }
    }

    pub fn vote_of(&self, voter: &AuthorId) -> Option<VoteKind> {
        if self.likes.contains(voter) {
            Some(VoteKind::Like)
        } else if self.dislikes.contains(voter) {
            Some(VoteKind::Dislike)
        } else {
            None
        }
    }

    pub fn voters(&self, kind: VoteKind) -> &BTreeSet<AuthorId> {
        match kind {
            VoteKind::Like => &self.likes,
            VoteKind::Dislike => &self.dislikes,
        }
    }

    fn voters_mut(&mut self, kind: VoteKind) -> &mut BTreeSet<AuthorId> {
        match kind {
            VoteKind::Like => &mut self.likes,
            VoteKind::Dislike => &mut self.dislikes,
        }
    }

    pub fn like_voters(&self) -> &BTreeSet<AuthorId> {
        &self.likes
    }

    pub fn dislike_voters(&self) -> &BTreeSet<AuthorId> {
        &self.dislikes
    }

    pub fn like_count(&self) -> u64 {
        self.likes.len() as u64
    }

    pub fn dislike_count(&self) -> u64 {
        self.dislikes.len() as u64
    }

    pub fn count(&self, kind: VoteKind) -> u64 {
        self.voters(kind).len() as u64
    }
}

/// Wire/document shape of a tally: both sets plus their sizes.
/// The counts are written for readers and ignored when reading back.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoteTallyRecord {
    #[serde(default)]
    like_voters: BTreeSet<AuthorId>,
    #[serde(default)]
    dislike_voters: BTreeSet<AuthorId>,
    #[serde(default, skip_deserializing)]
    like_count: u64,
    #[serde(default, skip_deserializing)]
    dislike_count: u64,
}

impl From<VoteTally> for VoteTallyRecord {
    fn from(tally: VoteTally) -> Self {
        Self {
            like_count: tally.like_count(),
            dislike_count: tally.dislike_count(),
            like_voters: tally.likes,
            dislike_voters: tally.dislikes,
        }
    }
}

impl TryFrom<VoteTallyRecord> for VoteTally {
    type Error = DomainError;

    fn try_from(record: VoteTallyRecord) -> Result<Self, Self::Error> {
        VoteTally::from_sets(record.like_voters, record.dislike_voters)
    }
}
