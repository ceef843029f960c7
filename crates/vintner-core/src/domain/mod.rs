//! # Domain Models
//!
//! Revision-stamped series values.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Case-sensitive series identifier |
//! | [`Observation`] | One value for an observation date as known on a vintage date |
//! | [`Vintage`] | Every observation published on one vintage date |
//! | [`DataDensity`] | Sparse (new/changed only) or dense (forward-filled) view |
//!
//! Observations sort canonically by `(symbol, obs_date, vintage_date)`; every collection
//! returned by the pipeline is in that order.

pub mod calendar;
mod observation;
mod symbol;

pub use observation::{is_missing_value, same_value, DataDensity, Observation, Vintage, MISSING_VALUE};
pub use symbol::Symbol;
