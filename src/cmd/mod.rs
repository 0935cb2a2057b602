pub mod interactive;
pub mod replace;
pub mod tools;
