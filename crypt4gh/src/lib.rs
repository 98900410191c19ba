//! Crypt4GH v1 container reading, transformation, and writing.
//!
//! A container is a magic/version/packet-count preamble, a list of
//! header packets (each sealed to one reader's public key, carrying
//! either a Data Encryption Key or an edit list), and a sequence of
//! up-to-64KiB data blocks encrypted under those keys. [`container::Container`]
//! is the entry point for reading one; [`writer::Writer`] builds one from
//! scratch; the [`filter`] functions re-derive a packet list for a
//! different set of recipients without touching the data blocks at all.
//!
//! Key material — in-memory, loaded from a Crypt4GH-armored file, held
//! by a local `gpg-agent`, or reached over HTTP — is unified behind the
//! [`key::Key`] trait so the rest of the crate never has to know which
//! backend it is holding.

pub mod block;
pub mod container;
pub mod error;
pub mod filter;
pub mod header;
pub mod key;
pub mod wire;
pub mod writer;

pub use block::DataBlock;
pub use container::{AnalysisReport, Container, ContainerError};
pub use error::{DekError, HeaderError, HeaderPacketError, KeyError, ProcessedError};
pub use header::Header;
pub use key::{Key, KeyCollection, SoftwareKey};
pub use writer::Writer;
