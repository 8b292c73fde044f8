//! Component contract and concrete device models.
//!
//! This is the component library spec.md treats as an opaque external
//! collaborator: each [`component::Component`] contributes MNA branch
//! equations and unknowns, and [`component::Circuit`] closes a netlist of
//! them into the raw equation system the classifier (`kirchhoff-solver`)
//! consumes.

pub mod component;
pub mod diode;
pub mod node;
pub mod opamp;
pub mod passive;
pub mod sources;

pub use component::{Circuit, Component};
pub use diode::Diode;
pub use node::Node;
pub use opamp::OpAmp;
pub use passive::{Capacitor, Resistor};
pub use sources::{VoltageSource, Waveform};
