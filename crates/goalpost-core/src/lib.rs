//! Domain logic for goalpost: entitlement evaluation, plan generation and
//! materialization, goal orchestration, task verification and the
//! leaderboard.
//!
//! Every operation takes the acting user as an explicit [`UserId`].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod entitlement;
pub mod goal;
pub mod leaderboard;
pub mod plan;
pub mod task;
pub mod token;
pub mod verify;

/// Identity of an authenticated user (the profile ID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
