pub mod framing;
pub mod parser;

pub use framing::LineFramer;
pub use parser::{SbsMessage, parse_sbs_line};
