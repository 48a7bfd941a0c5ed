pub mod function;
pub mod interp;
