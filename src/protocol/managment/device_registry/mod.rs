//! Functional device registry: the devices a stack instance knows about, keyed
//! by their NAME and, while it is valid, by their network address (NAD).
//!
//! Slots live in a fixed array. A record is allocated the first time a NAME is
//! needed and keeps its slot until removed; losing the NAD only invalidates the
//! address link so the record has to be re-resolved by NAME.
use crate::error::RegistryError;
use crate::protocol::managment::iso_name::IsoName;

//==================================================================================FUNCTIONAL_DEVICE
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// One known device and the application state attached to it.
pub struct FunctionalDevice<S> {
    name: IsoName,
    nad: Option<u8>,
    /// Per-device application state.
    pub state: S,
}

impl<S> FunctionalDevice<S> {
    /// Identity of the device.
    pub fn name(&self) -> IsoName {
        self.name
    }

    /// Current network address, `None` until claimed or after it was lost.
    pub fn nad(&self) -> Option<u8> {
        self.nad
    }
}

//==================================================================================DEVICE_REGISTRY
/// Fixed-capacity table of functional devices.
#[derive(Debug)]
pub struct DeviceRegistry<S, const N: usize = 16> {
    slots: [Option<FunctionalDevice<S>>; N],
}

impl<S, const N: usize> Default for DeviceRegistry<S, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, const N: usize> DeviceRegistry<S, N> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Number of allocated records.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Checks whether no record is allocated.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Maximum number of records.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Read-only iteration over every record.
    pub fn iter(&self) -> impl Iterator<Item = &FunctionalDevice<S>> {
        self.slots.iter().flatten()
    }

    /// Record for `name`.
    pub fn by_name(&self, name: IsoName) -> Option<&FunctionalDevice<S>> {
        self.iter().find(|d| d.name == name)
    }

    /// Mutable record for `name`.
    pub fn by_name_mut(&mut self, name: IsoName) -> Option<&mut FunctionalDevice<S>> {
        self.slots.iter_mut().flatten().find(|d| d.name == name)
    }

    /// Record currently holding `nad`.
    pub fn by_nad(&self, nad: u8) -> Option<&FunctionalDevice<S>> {
        self.iter().find(|d| d.nad == Some(nad))
    }

    /// Mutable record currently holding `nad`.
    pub fn by_nad_mut(&mut self, nad: u8) -> Option<&mut FunctionalDevice<S>> {
        self.slots.iter_mut().flatten().find(|d| d.nad == Some(nad))
    }

    /// Record for `name`, created with a default state when missing.
    pub fn alloc(&mut self, name: IsoName) -> Result<&mut FunctionalDevice<S>, RegistryError>
    where
        S: Default,
    {
        let index = match self.position(name) {
            Some(index) => index,
            None => {
                let Some(free) = self.slots.iter().position(Option::is_none) else {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("device table full ({} slots)", N);
                    return Err(RegistryError::TableFull);
                };
                self.slots[free] = Some(FunctionalDevice {
                    name,
                    nad: None,
                    state: S::default(),
                });
                free
            }
        };
        self.slots[index].as_mut().ok_or(RegistryError::NotFound)
    }

    /// Link `nad` to the record for `name`.
    ///
    /// A different record holding the same address loses it; its NAME is
    /// returned so the caller can report the loss.
    pub fn assign_nad(
        &mut self,
        name: IsoName,
        nad: u8,
    ) -> Result<Option<IsoName>, RegistryError> {
        let index = self.position(name).ok_or(RegistryError::NotFound)?;
        let other_holder = self.by_nad(nad).is_some_and(|holder| holder.name != name);
        let displaced = if other_holder {
            self.invalidate_nad(nad)
        } else {
            None
        };
        if let Some(device) = self.slots[index].as_mut() {
            device.nad = Some(nad);
        }
        Ok(displaced)
    }

    /// Drop the address link held by `nad`, returning the NAME that held it.
    pub fn invalidate_nad(&mut self, nad: u8) -> Option<IsoName> {
        let device = self.by_nad_mut(nad)?;
        device.nad = None;
        #[cfg(feature = "defmt")]
        defmt::debug!("nad {} lost by {=u64:#X}", nad, device.name.raw());
        Some(device.name)
    }

    /// Forget every address link, keeping the records.
    pub fn invalidate_all(&mut self) {
        for device in self.slots.iter_mut().flatten() {
            device.nad = None;
        }
    }

    /// Release the slot of `name`.
    pub fn remove(&mut self, name: IsoName) -> Option<FunctionalDevice<S>> {
        let index = self.position(name)?;
        self.slots[index].take()
    }

    fn position(&self, name: IsoName) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|d| d.name == name))
    }
}
