pub mod dsp;
pub mod filters;
pub mod hpss;
