pub mod crater;
pub mod math;
pub mod parameters;
