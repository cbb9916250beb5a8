//! Network management logic: address claiming, neighbour discovery, NAME
//! field manipulation, the functional device registry and stack instances.
pub mod address_claiming;
pub mod device_registry;
pub mod iso_name;
pub mod network_discovering;
pub mod stack;
