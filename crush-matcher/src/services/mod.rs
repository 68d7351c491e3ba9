// Business logic services layer
//
// Weekly generation and interest reconciliation sit on top of the pure
// matching core; the CLI and the queue consumer call into these.

pub mod generator;
pub mod interest;
pub mod matching;
