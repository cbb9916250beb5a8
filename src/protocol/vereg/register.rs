//! Register table supplied by the application and the handler interface the
//! engine dispatches accepted commands to.
use bitflags::bitflags;

use crate::core::{Variant, VariantTag};
use crate::protocol::vereg::AckCode;

bitflags! {
    /// Operations a remote node may perform on a register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

//==================================================================================REGISTER_DESCRIPTOR
/// Shape of one register: identifier, value type and allowed operations.
///
/// Decimal scales and buffer lengths travel in `tag`; the engine uses it to
/// decode writes and to normalise read replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDescriptor {
    pub id: u16,
    pub tag: VariantTag,
    pub access: Access,
    /// Human-readable label for diagnostics.
    pub name: &'static str,
}

impl RegisterDescriptor {
    pub const fn new(id: u16, tag: VariantTag, access: Access, name: &'static str) -> Self {
        Self {
            id,
            tag,
            access,
            name,
        }
    }

    pub fn readable(&self) -> bool {
        self.access.contains(Access::READ)
    }

    pub fn writable(&self) -> bool {
        self.access.contains(Access::WRITE)
    }
}

/// Descriptor for `id` in `table`.
pub fn lookup(table: &[RegisterDescriptor], id: u16) -> Option<&RegisterDescriptor> {
    table.iter().find(|d| d.id == id)
}

//==================================================================================HANDLER
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandKind {
    /// Peer asks for the current value.
    Read,
    /// Peer sets a new value.
    Write,
}

/// An accepted register command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterCommand<'a> {
    pub kind: CommandKind,
    /// Address of the requesting node.
    pub source: u8,
    pub register: &'a RegisterDescriptor,
    /// Value written; `Variant::None` for reads.
    pub value: Variant,
}

/// Handler answer: acknowledgement code and, for reads, the value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterReply {
    pub ack: AckCode,
    pub value: Variant,
}

impl RegisterReply {
    /// Successful command, returning `value` (ignored for writes).
    pub const fn ok(value: Variant) -> Self {
        Self {
            ack: AckCode::Ok,
            value,
        }
    }

    /// Command refused or completed without a value.
    pub const fn ack(ack: AckCode) -> Self {
        Self {
            ack,
            value: Variant::None,
        }
    }
}

/// Application side of the register protocol.
///
/// Called once per accepted command; unknown registers and access or type
/// violations are answered by the engine without reaching the handler.
pub trait RegisterHandler {
    fn handle_register(&mut self, command: RegisterCommand<'_>) -> RegisterReply;
}
