//! Identifiers for skeleton entities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense index of a bone within its [`Skeleton`](crate::skeleton::Skeleton).
///
/// Ids are only meaningful for the skeleton that issued them.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BoneId(pub u32);

impl BoneId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) fn from_index(idx: usize) -> Self {
        BoneId(idx as u32)
    }
}

impl fmt::Display for BoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
