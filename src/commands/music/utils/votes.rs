//! Skip and clear ballots for queue-protected playback.
//!
//! Each box maps every member of the session's voice channel to whether they
//! have voted. Boxes are rebuilt whenever channel membership changes or a new
//! item starts, and emptied when a vote resolves or the queue runs dry.

use serenity::model::id::UserId;
use std::collections::HashMap;

use super::music_manager::{MusicError, MusicResult};

/// Ballot count after a vote, and what it takes to resolve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub count: usize,
    pub total: usize,
    pub threshold: usize,
}

impl Tally {
    /// `count` reached the fixed minimum, or exceeds half of the channel.
    pub fn is_met(&self) -> bool {
        self.count >= self.threshold
    }
}

#[derive(Debug, Default, Clone)]
pub struct VoteBox {
    ballots: HashMap<UserId, bool>,
}

impl VoteBox {
    /// Give every listed member a fresh `false` ballot and drop everyone else.
    pub fn reset(&mut self, members: &[UserId]) {
        self.ballots = members.iter().map(|member| (*member, false)).collect();
    }

    pub fn clear(&mut self) {
        self.ballots.clear();
    }

    /// Whether the box holds a ballot for exactly these members.
    pub fn has_members(&self, members: &[UserId]) -> bool {
        members.len() == self.ballots.len()
            && members.iter().all(|member| self.ballots.contains_key(member))
    }

    pub fn is_empty(&self) -> bool {
        self.ballots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ballots.len()
    }

    pub fn has_voted(&self, member: UserId) -> bool {
        self.ballots.get(&member).copied().unwrap_or(false)
    }

    /// Record `member`'s ballot. Members outside the channel cannot vote.
    pub fn cast(&mut self, member: UserId, min_votes: usize) -> MusicResult<Tally> {
        let ballot = self
            .ballots
            .get_mut(&member)
            .ok_or(MusicError::NotInChannel)?;
        *ballot = true;

        Ok(self.tally(min_votes))
    }

    pub fn tally(&self, min_votes: usize) -> Tally {
        let count = self.ballots.values().filter(|voted| **voted).count();
        let total = self.ballots.len();
        // A strict majority of `total` is `total / 2 + 1` ballots
        let threshold = min_votes.min(total / 2 + 1).max(1);

        Tally {
            count,
            total,
            threshold,
        }
    }
}

/// The two ballot boxes a session keeps.
#[derive(Debug, Default, Clone)]
pub struct Ballots {
    pub skip: VoteBox,
    pub clear: VoteBox,
}

impl Ballots {
    pub fn reset(&mut self, members: &[UserId]) {
        self.skip.reset(members);
        self.clear.reset(members);
    }

    pub fn clear(&mut self) {
        self.skip.clear();
        self.clear.clear();
    }

    /// Reset both boxes if the member set changed. Returns whether it did.
    pub fn sync(&mut self, members: &[UserId]) -> bool {
        if self.skip.has_members(members) && self.clear.has_members(members) {
            return false;
        }
        self.reset(members);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.skip.is_empty() && self.clear.is_empty()
    }
}

/// Whether a just-recorded ballot fires the action.
pub fn resolves(tally: &Tally, is_requester: bool, is_moderator: bool) -> bool {
    is_requester || is_moderator || tally.is_met()
}
