//! Header packet filters.
//!
//! A filter is a pure function from the original packet list to a new
//! raw-byte packet list ready for [`crate::writer::write_container`],
//! rather than a header-view class wrapping the original header with a
//! back-reference. There is nothing to hold a reference to, so there is
//! nothing that can cycle. Filters compose by calling one after another;
//! the data blocks are always passed through untouched.

pub mod add_recipient;
pub mod identity;
pub mod only_readable;

pub use add_recipient::add_recipient;
pub use identity::identity;
pub use only_readable::only_readable;
