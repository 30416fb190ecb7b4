pub mod decimal;
pub mod float;
pub mod grisu;
pub mod number;

pub use decimal::Decimal;
pub use float::{write_f32, write_f64};
pub use number::{
    parse_big_integer, parse_decimal, parse_f64, parse_i16, parse_i32, parse_i64, parse_u64,
    validate, write_i64, write_u64, NumberShape,
};
