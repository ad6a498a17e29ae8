//! Error types for adbridge-media.

use thiserror::Error;

/// Result type for adbridge-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for adbridge-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The tag does not start with the `ID3` identifier.
    #[error("Invalid ID3 magic: {0:02x?}")]
    InvalidMagic([u8; 3]),

    /// The tag's major/revision version is newer than supported.
    #[error("Unsupported ID3 version: {version:#06x} (max: {max:#06x})")]
    UnsupportedVersion { version: u16, max: u16 },

    /// The tag sets header flags that are not supported.
    #[error("Disallowed ID3 flags: {flags:#04x}")]
    DisallowedFlags { flags: u8 },

    /// The tag declares an empty body.
    #[error("ID3 tag has zero-length body")]
    EmptyTag,

    /// A syncsafe integer had a byte with its high bit set.
    #[error("Invalid syncsafe integer: {0:02x?}")]
    InvalidSyncsafe([u8; 4]),

    /// A frame claims more data than the tag holds.
    #[error("Frame {id} overruns tag: {size} bytes at offset {offset}, tag ends at {end}")]
    FrameOverrun {
        id: String,
        size: usize,
        offset: usize,
        end: usize,
    },

    /// A frame identifier is not four ASCII alphanumerics.
    #[error("Invalid frame id: {0:02x?}")]
    InvalidFrameId([u8; 4]),

    /// Buffer too small for operation.
    #[error("Buffer underflow: need {need} bytes, have {have}")]
    BufferUnderflow { need: usize, have: usize },

    /// Invalid event message box.
    #[error("Invalid emsg: {0}")]
    InvalidEmsg(String),
}

impl Error {
    /// Create an invalid emsg error.
    pub fn invalid_emsg(msg: impl Into<String>) -> Self {
        Self::InvalidEmsg(msg.into())
    }

    /// Check that `have` bytes cover `need`.
    pub(crate) fn ensure(need: usize, have: usize) -> Result<()> {
        if have < need {
            Err(Self::BufferUnderflow { need, have })
        } else {
            Ok(())
        }
    }
}
