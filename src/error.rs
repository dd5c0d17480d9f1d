use std::io;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("input file {} does not exist", .0.display())]
    Missing(PathBuf),
    #[error("no encoding detector available for {}", .0.display())]
    DetectionUnavailable(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not valid {encoding}", .path.display())]
    Decode { path: PathBuf, encoding: String },
    #[error("failed to encode {} as {encoding}: {reason}", .path.display())]
    Encode {
        path: PathBuf,
        encoding: String,
        reason: String,
    },
    #[error("failed to write {}: {detail}", .path.display())]
    Write { path: PathBuf, detail: String },
}

impl ConvertError {
    /// Stable label recorded in the run summary.
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::Missing(_) => "missing_file",
            ConvertError::DetectionUnavailable(_) => "detection_unavailable",
            ConvertError::Read { .. } | ConvertError::Decode { .. } => "read_failure",
            ConvertError::Encode { .. } => "encode_failure",
            ConvertError::Write { .. } => "write_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_and_io_errors_share_read_kind() {
        let decode = ConvertError::Decode {
            path: PathBuf::from("a.txt"),
            encoding: "Big5".into(),
        };
        let read = ConvertError::Read {
            path: PathBuf::from("a.txt"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(decode.kind(), "read_failure");
        assert_eq!(read.kind(), "read_failure");
    }

    #[test]
    fn messages_name_the_path() {
        let err = ConvertError::Missing(PathBuf::from("gone.txt"));
        assert_eq!(err.to_string(), "input file gone.txt does not exist");
    }
}
