pub mod consume;
pub mod enqueue;
pub mod generate;
pub mod matches;
pub mod migrate;
