//! Binds a [`Header`] to its data-block stream, enforcing single-use
//! iteration and the `decrypt=false`/`analyze=true` modes.

use std::io::Read;

use crate::block::{self, DataBlock};
use crate::error::{HeaderError, ProcessedError};
use crate::header::packet::PacketOutcome;
use crate::header::Header;
use crate::key::collection::KeyCollection;

/// A Crypt4GH container being read from a stream.
///
/// Header packets are decrypted as soon as [`Container::header`] (or
/// [`Container::analyze`]) is called; the data-block stream is lazy and
/// single-use — a second call to [`Container::data_blocks`] raises
/// [`ProcessedError`].
pub struct Container<R: Read> {
    stream: R,
    header: Header,
    reader_keys: Option<KeyCollection>,
    decrypt: bool,
    consumed: bool,
    offset: u64,
}

impl<R: Read> Container<R> {
    /// Parses the container's fixed preamble (magic/version/count) but
    /// defers header-packet decryption.
    pub fn open(mut stream: R, reader_keys: KeyCollection, decrypt: bool) -> Result<Self, HeaderError> {
        let header = Header::parse(&mut stream)?;
        Ok(Self {
            stream,
            header,
            reader_keys: Some(reader_keys),
            decrypt,
            consumed: false,
            offset: 0,
        })
    }

    /// Parses (if needed) and returns the header.
    pub fn header(&mut self) -> Result<&Header, HeaderError> {
        self.ensure_header_loaded()?;
        Ok(&self.header)
    }

    fn ensure_header_loaded(&mut self) -> Result<(), HeaderError> {
        if self.header.is_loaded() {
            return Ok(());
        }
        let mut reader_keys = self
            .reader_keys
            .take()
            .ok_or_else(|| HeaderError::new("reader key collection already consumed"))?;
        self.header.load_packets(&mut self.stream, &mut reader_keys)?;
        self.reader_keys = Some(reader_keys);
        Ok(())
    }

    /// Reads the next data block, decrypting it against the header's DEK
    /// collection unless this container was opened with `decrypt=false`.
    /// Returns `Ok(None)` at end of stream. Marks the stream consumed on
    /// the first `None`.
    pub fn next_block(&mut self) -> Result<Option<DataBlock>, ContainerError> {
        self.ensure_header_loaded().map_err(ContainerError::Header)?;
        if self.consumed {
            return Err(ContainerError::Processed(ProcessedError));
        }
        let deks = if self.decrypt {
            Some(self.header.deks())
        } else {
            None
        };
        let block = block::read_block(&mut self.stream, deks, self.offset)
            .map_err(|e| ContainerError::Io(e.to_string()))?;
        match &block {
            Some(b) => self.offset += b.size(),
            None => self.consumed = true,
        }
        Ok(block)
    }

    /// A single-use iterator over every data block.
    pub fn data_blocks(&mut self) -> Result<DataBlockIter<'_, R>, ContainerError> {
        self.ensure_header_loaded().map_err(ContainerError::Header)?;
        if self.consumed {
            return Err(ContainerError::Processed(ProcessedError));
        }
        Ok(DataBlockIter { container: self })
    }

    /// Consumes the data-block stream, producing a typed summary instead
    /// of the deciphered bytes — used by tooling that inspects a
    /// container's shape without needing the private key to hold
    /// plaintext in memory for long.
    pub fn analyze(&mut self) -> Result<AnalysisReport, ContainerError> {
        self.ensure_header_loaded().map_err(ContainerError::Header)?;

        let packets = self
            .header
            .packets()
            .expect("header just loaded")
            .iter()
            .map(|p| PacketAnalysis {
                readable: p.is_readable(),
                reader_public_key: p.reader_public_key().copied(),
                kind: match p.outcome() {
                    PacketOutcome::Unreadable => PacketKind::Unreadable,
                    PacketOutcome::DataEncryptionParameters { .. } => {
                        PacketKind::DataEncryptionParameters
                    }
                    PacketOutcome::EditList { .. } => PacketKind::EditList,
                    PacketOutcome::Unknown { packet_type, .. } => {
                        PacketKind::Unknown(*packet_type)
                    }
                },
            })
            .collect();

        let mut readers: Vec<[u8; 32]> = Vec::new();
        for p in &packets {
            if p.readable {
                if let Some(key) = p.reader_public_key {
                    if !readers.contains(&key) {
                        readers.push(key);
                    }
                }
            }
        }

        let mut blocks = Vec::new();
        while let Some(block) = self.next_block()? {
            blocks.push(BlockAnalysis {
                offset: block.offset(),
                size: block.size(),
                deciphered: block.is_deciphered(),
                dek_index: block.dek_index(),
            });
        }

        tracing::info!(
            packets = packets.len(),
            blocks = blocks.len(),
            readers = readers.len(),
            readable_packets = packets.iter().filter(|p| p.readable).count(),
            "container analyzed"
        );
        Ok(AnalysisReport { packets, readers, blocks })
    }
}

/// Single-use iterator over a container's data blocks.
pub struct DataBlockIter<'a, R: Read> {
    container: &'a mut Container<R>,
}

impl<'a, R: Read> Iterator for DataBlockIter<'a, R> {
    type Item = Result<DataBlock, ContainerError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.container.next_block() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[derive(Debug)]
pub enum ContainerError {
    Header(HeaderError),
    Processed(ProcessedError),
    Io(String),
}

impl std::fmt::Display for ContainerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerError::Header(e) => write!(f, "{e}"),
            ContainerError::Processed(e) => write!(f, "{e}"),
            ContainerError::Io(msg) => write!(f, "[IO] {msg}"),
        }
    }
}

impl std::error::Error for ContainerError {}

/// A structural summary of a container produced by [`Container::analyze`].
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub packets: Vec<PacketAnalysis>,
    /// Deduplicated public keys of every reader that could decrypt at
    /// least one header packet.
    pub readers: Vec<[u8; 32]>,
    pub blocks: Vec<BlockAnalysis>,
}

#[derive(Debug, Clone)]
pub struct PacketAnalysis {
    pub readable: bool,
    pub reader_public_key: Option<[u8; 32]>,
    pub kind: PacketKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Unreadable,
    DataEncryptionParameters,
    EditList,
    Unknown(u32),
}

#[derive(Debug, Clone)]
pub struct BlockAnalysis {
    pub offset: u64,
    pub size: u64,
    pub deciphered: bool,
    pub dek_index: Option<usize>,
}
