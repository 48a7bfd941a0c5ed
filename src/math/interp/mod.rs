mod interp;

pub use interp::*;
