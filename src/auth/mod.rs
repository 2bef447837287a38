//! Authentication module.
//!
//! Handles shared cluster keys, key rotation, credential encoding and
//! verification of inbound request sources.

mod credential;
mod key_file;
mod key_store;
mod shared_key;
mod source;

pub use credential::{Credential, Rejection, CLUSTER_KEY_SCHEME};
pub use key_file::load_key_file;
pub use key_store::KeyStore;
pub use shared_key::SharedKey;
pub use source::SourceAuthenticator;
