//! Protocol side of the stack: CAN transport and Fast Packets, network
//! management (addresses, devices, stack instances) and VE.Reg.
pub mod managment;
pub mod transport;
pub mod vereg;
