//! Owner of every stack instance of the node.
//!
//! Instances are addressed explicitly by index with [`StackManager::get`] and
//! [`StackManager::get_mut`]. An "active" instance is also kept for call
//! sites written before several channels existed; see
//! [`StackManager::active`].
use crate::error::StackError;

/// Fixed set of `N` stack instances.
#[derive(Debug)]
pub struct StackManager<I, const N: usize> {
    instances: [I; N],
    active: usize,
}

impl<I, const N: usize> StackManager<I, N> {
    /// Manage `instances`; the first one starts active.
    pub fn new(instances: [I; N]) -> Self {
        Self {
            instances,
            active: 0,
        }
    }

    /// Number of configured instances.
    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Select the instance used by [`active`](Self::active).
    ///
    /// With a single configured instance an out-of-range index is ignored.
    /// Otherwise it is a programming error: asserted in debug builds and
    /// reported as [`StackError::InstanceOutOfRange`] in release builds.
    pub fn set_active(&mut self, index: usize) -> Result<(), StackError> {
        if index < N {
            self.active = index;
            return Ok(());
        }
        if N == 1 {
            return Ok(());
        }
        debug_assert!(index < N, "stack instance {} out of range ({})", index, N);
        Err(StackError::InstanceOutOfRange {
            index,
            configured: N,
        })
    }

    /// Index of the active instance.
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Active instance.
    ///
    /// Compatibility shim for single-channel code; new code should hold an
    /// index and use [`get`](Self::get).
    pub fn active(&self) -> &I {
        &self.instances[self.active]
    }

    /// Mutable active instance; same caveat as [`active`](Self::active).
    pub fn active_mut(&mut self) -> &mut I {
        &mut self.instances[self.active]
    }

    /// Instance at `index`.
    pub fn get(&self, index: usize) -> Result<&I, StackError> {
        self.instances
            .get(index)
            .ok_or(StackError::InstanceOutOfRange {
                index,
                configured: N,
            })
    }

    /// Mutable instance at `index`.
    pub fn get_mut(&mut self, index: usize) -> Result<&mut I, StackError> {
        self.instances
            .get_mut(index)
            .ok_or(StackError::InstanceOutOfRange {
                index,
                configured: N,
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &I> {
        self.instances.iter()
    }

    /// Every instance, for a main loop ticking them all.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut I> {
        self.instances.iter_mut()
    }
}
