//! # Bufferflow Communication
//!
//! Serial transport and firmware buffer-flow control.
//! A connection stages outgoing commands and feeds incoming bytes to a
//! per-firmware flow controller that keeps the device's receive buffer
//! from overflowing.

pub mod communication;
pub mod firmware;

pub use communication::{
    list_ports, PortLink, RealSerialPort, SerialConnection, SerialPort, SerialSettings, StagedCommand,
    Transport,
};

pub use firmware::{
    create_buffer_flow, BufferAlgorithm, BufferFlow, FlowController, FlowOptions, Marlin,
    Repetier, SendDecision,
};
