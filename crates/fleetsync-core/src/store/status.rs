// ── Per-entity operation status ──
//
// While a per-entity operation is in flight its flag is raised on that
// entity's status record. A flag that is already raised blocks a second
// request for the same verb on the same entity.

use std::collections::BTreeSet;

use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Named in-flight operation on a single entity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusFlag {
    Aborting,
    Acquiring,
    CheckingPower,
    Commissioning,
    Deleting,
    Deploying,
    EnteringRescueMode,
    ExitingRescueMode,
    Locking,
    MarkingBroken,
    MarkingFixed,
    OverridingFailedTesting,
    PoweringOff,
    PoweringOn,
    Refreshing,
    Releasing,
    SettingPool,
    SettingZone,
    Tagging,
    Testing,
    Unlocking,
    Unsubscribing,
    Untagging,
}

/// Status record of one entity. Every flag defaults to `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EntityStatus {
    raised: BTreeSet<StatusFlag>,
}

impl EntityStatus {
    pub fn get(&self, flag: StatusFlag) -> bool {
        self.raised.contains(&flag)
    }

    /// Flags currently raised, in declaration order.
    pub fn raised(&self) -> impl Iterator<Item = StatusFlag> + '_ {
        self.raised.iter().copied()
    }

    pub fn is_idle(&self) -> bool {
        self.raised.is_empty()
    }

    /// Returns `true` if the flag changed.
    pub(crate) fn set(&mut self, flag: StatusFlag, on: bool) -> bool {
        if on {
            self.raised.insert(flag)
        } else {
            self.raised.remove(&flag)
        }
    }
}
