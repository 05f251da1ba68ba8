pub mod datetime;
pub mod test_utils;

pub use datetime::{format_wire, localize, parse_wire, WIRE_FORMAT};
