pub mod args;

pub use args::{Arguments, parse};
