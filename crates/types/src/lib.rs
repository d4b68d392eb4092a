pub mod number;
pub mod value;

pub use number::Number;
pub use value::{Map, Value};
