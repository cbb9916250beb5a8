//! ISO 11783 / J1939 NAME: the 64-bit identity a node claims an address with.
//!
//! The NAME is what the device registry keys on; addresses come and go, the
//! NAME stays. During arbitration the numerically lower NAME keeps the
//! address, which is why [`IsoName`] orders by its raw value.
//!
//! ```text
//!  63  62..60  59..56  55..49  48  47..40  39..35  34..32  31..21  20..0
//! AAC  group   sys.in  class   r   func    inst.hi inst.lo mfg     unique
//! ```

use core::fmt;

//==================================================================================FIELDS
/// `(shift, width)` of every NAME field.
mod field {
    pub const UNIQUE: (u32, u32) = (0, 21);
    pub const MANUFACTURER: (u32, u32) = (21, 11);
    pub const INSTANCE_LOWER: (u32, u32) = (32, 3);
    pub const INSTANCE_UPPER: (u32, u32) = (35, 5);
    pub const FUNCTION: (u32, u32) = (40, 8);
    pub const SPARE: (u32, u32) = (48, 1);
    pub const CLASS: (u32, u32) = (49, 7);
    pub const SYSTEM_INSTANCE: (u32, u32) = (56, 4);
    pub const INDUSTRY_GROUP: (u32, u32) = (60, 3);
    pub const AAC: (u32, u32) = (63, 1);
}

/// Industry group of marine equipment.
pub const INDUSTRY_GROUP_MARINE: u8 = 4;

const fn mask(width: u32) -> u64 {
    (1u64 << width) - 1
}

const fn get(raw: u64, field: (u32, u32)) -> u64 {
    (raw >> field.0) & mask(field.1)
}

const fn set(raw: u64, field: (u32, u32), value: u64) -> u64 {
    (raw & !(mask(field.1) << field.0)) | ((value & mask(field.1)) << field.0)
}

//==================================================================================ISO_NAME
/// Device NAME as carried by PGN 60928.
///
/// ```
/// use n2k_vereg::protocol::managment::iso_name::IsoName;
///
/// let name = IsoName::builder()
///     .unique_number(123456)
///     .manufacturer_code(358)
///     .device_function(170)
///     .device_class(35)
///     .arbitrary_address_capable(true)
///     .build();
///
/// assert_eq!(name.unique_number(), 123456);
/// assert_eq!(name.manufacturer_code(), 358);
/// assert!(name.is_arbitrary_address_capable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IsoName(u64);

impl IsoName {
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn builder() -> IsoNameBuilder {
        IsoNameBuilder::new()
    }

    /// Serial-like number, unique within the manufacturer's products.
    #[inline]
    pub const fn unique_number(&self) -> u32 {
        get(self.0, field::UNIQUE) as u32
    }

    #[inline]
    pub const fn manufacturer_code(&self) -> u16 {
        get(self.0, field::MANUFACTURER) as u16
    }

    #[inline]
    pub const fn device_instance_lower(&self) -> u8 {
        get(self.0, field::INSTANCE_LOWER) as u8
    }

    #[inline]
    pub const fn device_instance_upper(&self) -> u8 {
        get(self.0, field::INSTANCE_UPPER) as u8
    }

    /// Both instance parts joined into one byte.
    #[inline]
    pub const fn device_instance(&self) -> u8 {
        self.device_instance_lower() | (self.device_instance_upper() << 3)
    }

    #[inline]
    pub const fn device_function(&self) -> u8 {
        get(self.0, field::FUNCTION) as u8
    }

    #[inline]
    pub const fn spare(&self) -> bool {
        get(self.0, field::SPARE) != 0
    }

    #[inline]
    pub const fn device_class(&self) -> u8 {
        get(self.0, field::CLASS) as u8
    }

    #[inline]
    pub const fn system_instance(&self) -> u8 {
        get(self.0, field::SYSTEM_INSTANCE) as u8
    }

    #[inline]
    pub const fn industry_group(&self) -> u8 {
        get(self.0, field::INDUSTRY_GROUP) as u8
    }

    /// The node may move to another address (128..=247) after losing a claim.
    #[inline]
    pub const fn is_arbitrary_address_capable(&self) -> bool {
        get(self.0, field::AAC) != 0
    }

    #[inline]
    pub const fn is_marine(&self) -> bool {
        self.industry_group() == INDUSTRY_GROUP_MARINE
    }

    /// True when this NAME keeps an address contested by `other`.
    #[inline]
    pub const fn has_priority_over(&self, other: IsoName) -> bool {
        self.0 < other.0
    }

    /// Wire form carried by an Address Claim frame.
    #[inline]
    pub const fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub const fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }
}

impl From<u64> for IsoName {
    #[inline]
    fn from(raw: u64) -> Self {
        Self::from_raw(raw)
    }
}

impl From<IsoName> for u64 {
    #[inline]
    fn from(name: IsoName) -> Self {
        name.raw()
    }
}

impl fmt::Display for IsoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:016X} (mfg {}, unique {}, function {}, instance {})",
            self.0,
            self.manufacturer_code(),
            self.unique_number(),
            self.device_function(),
            self.device_instance()
        )
    }
}

//==================================================================================BUILDER
/// Const builder for [`IsoName`].
///
/// Setters panic when a value does not fit its field, which turns a bad
/// constant NAME into a compile error.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoNameBuilder {
    raw: u64,
}

impl IsoNameBuilder {
    #[inline]
    pub const fn new() -> Self {
        Self { raw: 0 }
    }

    #[inline]
    const fn with(mut self, field: (u32, u32), value: u64) -> Self {
        assert!(value <= mask(field.1), "value does not fit the NAME field");
        self.raw = set(self.raw, field, value);
        self
    }

    #[inline]
    pub const fn unique_number(self, value: u32) -> Self {
        self.with(field::UNIQUE, value as u64)
    }

    #[inline]
    pub const fn manufacturer_code(self, value: u16) -> Self {
        self.with(field::MANUFACTURER, value as u64)
    }

    #[inline]
    pub const fn device_instance_lower(self, value: u8) -> Self {
        self.with(field::INSTANCE_LOWER, value as u64)
    }

    #[inline]
    pub const fn device_instance_upper(self, value: u8) -> Self {
        self.with(field::INSTANCE_UPPER, value as u64)
    }

    /// Split a full instance byte over its two fields.
    #[inline]
    pub const fn device_instance(self, value: u8) -> Self {
        self.device_instance_lower(value & 0x07)
            .device_instance_upper(value >> 3)
    }

    #[inline]
    pub const fn device_function(self, value: u8) -> Self {
        self.with(field::FUNCTION, value as u64)
    }

    #[inline]
    pub const fn spare(self, value: bool) -> Self {
        self.with(field::SPARE, value as u64)
    }

    #[inline]
    pub const fn device_class(self, value: u8) -> Self {
        self.with(field::CLASS, value as u64)
    }

    #[inline]
    pub const fn system_instance(self, value: u8) -> Self {
        self.with(field::SYSTEM_INSTANCE, value as u64)
    }

    #[inline]
    pub const fn industry_group(self, value: u8) -> Self {
        self.with(field::INDUSTRY_GROUP, value as u64)
    }

    #[inline]
    pub const fn arbitrary_address_capable(self, value: bool) -> Self {
        self.with(field::AAC, value as u64)
    }

    #[inline]
    pub const fn build(self) -> IsoName {
        IsoName(self.raw)
    }
}
