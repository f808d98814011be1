//! Access control service.
//!
//! The trusted-extension registry, the administrator and the pause flags are
//! held by an explicit service that is injected into the core and the fee
//! collector and queried on every call.
//!
//! # Thread Safety
//!
//! [`AccessRegistry`] uses `RwLock` internally and can be shared across
//! threads behind an `Arc`. A poisoned lock is recovered rather than
//! propagated, since every write leaves the registry consistent.

use crate::{Address, LedgerError, Result};
use std::collections::HashSet;
use std::sync::RwLock;

/// Read side of the access control service, as seen by the core.
pub trait AccessControl: Send + Sync {
    /// Current administrator.
    fn admin(&self) -> Address;

    /// Whether `caller` may mutate requests through the core.
    fn is_trusted(&self, caller: &Address) -> bool;

    /// Whether new requests may not be created through `extension`.
    fn is_creation_paused(&self, extension: &Address) -> bool;

    fn is_admin(&self, caller: &Address) -> bool {
        !caller.is_zero() && self.admin() == *caller
    }

    fn require_admin(&self, caller: &Address) -> Result<()> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            Err(LedgerError::NotAdmin(*caller))
        }
    }

    fn require_trusted(&self, caller: &Address) -> Result<()> {
        if self.is_trusted(caller) {
            Ok(())
        } else {
            Err(LedgerError::UntrustedExtension(*caller))
        }
    }
}

struct AccessState {
    admin: Address,
    trusted: HashSet<Address>,
    paused: bool,
    paused_extensions: HashSet<Address>,
}

/// Default [`AccessControl`] implementation with an administrative surface.
///
/// # Example
///
/// ```rust
/// use reqnet_lib::{AccessControl, AccessRegistry, Address};
///
/// let admin = Address::from_label("admin");
/// let extension = Address::from_label("native");
/// let registry = AccessRegistry::new(admin);
/// registry.add_trusted_extension(&admin, extension).unwrap();
/// assert!(registry.is_trusted(&extension));
/// ```
pub struct AccessRegistry {
    state: RwLock<AccessState>,
}

impl AccessRegistry {
    pub fn new(admin: Address) -> Self {
        Self {
            state: RwLock::new(AccessState {
                admin,
                trusted: HashSet::new(),
                paused: false,
                paused_extensions: HashSet::new(),
            }),
        }
    }

    fn write_as_admin<T>(
        &self,
        caller: &Address,
        f: impl FnOnce(&mut AccessState) -> T,
    ) -> Result<T> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if caller.is_zero() || state.admin != *caller {
            tracing::warn!(%caller, "rejected administrative call");
            return Err(LedgerError::NotAdmin(*caller));
        }
        Ok(f(&mut state))
    }

    /// Registers an extension as a trusted caller of the core.
    ///
    /// Returns false if it was already trusted.
    pub fn add_trusted_extension(&self, caller: &Address, extension: Address) -> Result<bool> {
        extension.require_nonzero("extension")?;
        let added = self.write_as_admin(caller, |s| s.trusted.insert(extension))?;
        tracing::debug!(%extension, added, "trusted extension added");
        Ok(added)
    }

    /// Revokes an extension. Requests it owns can no longer be mutated.
    pub fn remove_trusted_extension(&self, caller: &Address, extension: &Address) -> Result<bool> {
        let removed = self.write_as_admin(caller, |s| s.trusted.remove(extension))?;
        tracing::debug!(%extension, removed, "trusted extension removed");
        Ok(removed)
    }

    /// Blocks request creation on every extension.
    pub fn pause(&self, caller: &Address) -> Result<()> {
        self.write_as_admin(caller, |s| s.paused = true)?;
        tracing::info!("request creation paused");
        Ok(())
    }

    pub fn unpause(&self, caller: &Address) -> Result<()> {
        self.write_as_admin(caller, |s| s.paused = false)?;
        tracing::info!("request creation resumed");
        Ok(())
    }

    /// Blocks request creation on one extension.
    pub fn pause_extension(&self, caller: &Address, extension: Address) -> Result<()> {
        self.write_as_admin(caller, |s| {
            s.paused_extensions.insert(extension);
        })
    }

    pub fn unpause_extension(&self, caller: &Address, extension: &Address) -> Result<()> {
        self.write_as_admin(caller, |s| {
            s.paused_extensions.remove(extension);
        })
    }

    /// Hands the administrator capability to `new_admin`.
    pub fn transfer_admin(&self, caller: &Address, new_admin: Address) -> Result<()> {
        new_admin.require_nonzero("new admin")?;
        self.write_as_admin(caller, |s| s.admin = new_admin)?;
        tracing::info!(%new_admin, "administrator changed");
        Ok(())
    }

    /// Returns all trusted extensions.
    pub fn trusted_extensions(&self) -> Vec<Address> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<_> = state.trusted.iter().copied().collect();
        out.sort();
        out
    }

    pub fn is_paused(&self) -> bool {
        self.state.read().unwrap_or_else(|e| e.into_inner()).paused
    }
}

impl AccessControl for AccessRegistry {
    fn admin(&self) -> Address {
        self.state.read().unwrap_or_else(|e| e.into_inner()).admin
    }

    fn is_trusted(&self, caller: &Address) -> bool {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.trusted.contains(caller)
    }

    fn is_creation_paused(&self, extension: &Address) -> bool {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.paused || state.paused_extensions.contains(extension)
    }
}
