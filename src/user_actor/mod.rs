//! User-specific actor wiring: the `Entity` implementation that lets the
//! generic resource actor manage user rows.

pub mod entity;
