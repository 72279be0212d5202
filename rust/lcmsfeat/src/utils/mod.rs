pub mod stats;
mod tuple_range;

pub use tuple_range::{
    TupleRange,
    TupleRangeError,
    binary_search_range_by_key,
};
