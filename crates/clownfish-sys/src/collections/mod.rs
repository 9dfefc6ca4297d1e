pub mod bytebuf;
pub mod hash;
pub mod string;
pub mod vector;
