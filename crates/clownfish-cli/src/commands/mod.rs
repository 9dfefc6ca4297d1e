pub mod echo;
pub mod hello;
pub mod throw;
pub mod trap;
