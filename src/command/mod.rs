//! Wire command decoding for the local command topic.
//!
//! Commands arrive as `"<actuator>,<value>"` text, e.g. `"light,1"` or `"air,0"`.
//! The parser only splits and converts; resolving the actuator name happens in
//! [`crate::actuator::dispatcher`].

pub mod parser;

pub use parser::{parse, parse_int_lenient, Command, ParseError};
