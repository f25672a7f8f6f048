// common/src/download.rs
use serde::Serialize;

pub const FIRMWARE_CONTENT_TYPE: &str = "application/zip";

/// A firmware archive ready to be handed to the user agent as a file download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirmwareDownload {
    pub file_name: String,
    pub content_type: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl FirmwareDownload {
    /// Value for the `Content-Disposition` header
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name)
    }
}

/// Package firmware bytes for download as `{identity}.firmware.{arch}.zip`.
///
/// The bytes are passed through untouched; the backend already stores a zip.
pub fn firmware_download(identity: &str, arch: &str, firmware: Vec<u8>) -> FirmwareDownload {
    FirmwareDownload {
        file_name: format!("{}.firmware.{}.zip", identity, arch),
        content_type: FIRMWARE_CONTENT_TYPE,
        bytes: firmware,
    }
}
