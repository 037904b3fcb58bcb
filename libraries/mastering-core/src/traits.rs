/// Core traits for Soul Mastering
use crate::error::Result;
use crate::types::DecodedAudio;

/// Audio decoder trait
///
/// Implementers turn an encoded file (any container/codec they understand) into
/// `DecodedAudio`. The mastering pipeline never decodes by itself; it only consumes
/// what a decoder hands it.
pub trait AudioDecoder: Send {
    /// Decode an in-memory encoded file
    ///
    /// `extension_hint` is the file extension (without the dot) if known, used to
    /// speed up format detection.
    ///
    /// # Errors
    /// Returns `MasteringError::Decode` if the bytes are malformed or unsupported
    fn decode_bytes(&mut self, bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<DecodedAudio>;

    /// Decode a file from disk
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or decoded
    fn decode_file(&mut self, path: &std::path::Path) -> Result<DecodedAudio> {
        let bytes = std::fs::read(path)?;
        let extension = path.extension().and_then(|e| e.to_str());
        self.decode_bytes(bytes, extension)
    }
}
