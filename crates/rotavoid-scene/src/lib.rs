//! `rotavoid-scene` – the collaborators the avoidance core reads from.
//!
//! The core only talks to two traits; the concrete types here exist so the
//! core can be driven and tested.
//!
//! # Modules
//!
//! - [`obstacle`] – [`Obstacle`][obstacle::Obstacle]: Gamma, normal,
//!   reference point and local radius of a geometric obstacle.
//! - [`ellipse`] – [`Ellipse`][ellipse::Ellipse]: n-dimensional ellipsoid
//!   (circles and spheres included), optionally a boundary or moving.
//! - [`dynamics`] – [`VelocityField`][dynamics::VelocityField] with the
//!   [`LinearSystem`][dynamics::LinearSystem] attractor field and
//!   [`ConstantValue`][dynamics::ConstantValue].

pub mod dynamics;
pub mod ellipse;
pub mod obstacle;

pub use dynamics::{ConstantValue, LinearSystem, VelocityField};
pub use ellipse::Ellipse;
pub use obstacle::Obstacle;
