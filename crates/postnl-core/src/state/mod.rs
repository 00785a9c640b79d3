// # Token Store Implementations
//
// This module provides implementations of the TokenStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::{FileTokenStore, FileTokenStoreFactory};
pub use memory::{MemoryTokenStore, MemoryTokenStoreFactory};
