//! Cipher primitives used by the decryption filters.

mod aes;
mod arc4;

pub use aes::Aes;
pub use arc4::Arc4;
