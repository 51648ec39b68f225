use serde::{Deserialize, Serialize};

use crate::{
    environment::CarryFlags,
    error::{Error, Result},
};

/// Key-possession phase, used to pick one of the multi-policy agent's tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubPolicy {
    NoKeys,
    OneKey,
    BothKeys,
}

impl SubPolicy {
    pub const COUNT: usize = 3;
    pub const ALL: [SubPolicy; SubPolicy::COUNT] =
        [SubPolicy::NoKeys, SubPolicy::OneKey, SubPolicy::BothKeys];

    /// Maps carry flags to a phase. The second flag without the first can't
    /// come out of the environment and is rejected.
    pub fn select(carrying: CarryFlags) -> Result<Self> {
        match (carrying.first, carrying.second) {
            (false, false) => Ok(SubPolicy::NoKeys),
            (true, false) => Ok(SubPolicy::OneKey),
            (true, true) => Ok(SubPolicy::BothKeys),
            (false, true) => Err(Error::InvalidCarryState {
                first: false,
                second: true,
            }),
        }
    }

    /// Slot of this phase in the agent's policy array; also the file suffix.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            SubPolicy::NoKeys => "no keys",
            SubPolicy::OneKey => "one key",
            SubPolicy::BothKeys => "both keys",
        }
    }

    /// Carry flags that select this phase.
    pub fn flags(self) -> CarryFlags {
        match self {
            SubPolicy::NoKeys => CarryFlags::new(false, false),
            SubPolicy::OneKey => CarryFlags::new(true, false),
            SubPolicy::BothKeys => CarryFlags::new(true, true),
        }
    }
}
