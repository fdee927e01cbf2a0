use crate::error::{FileFault, RoutingError};
use connectors::error::FileError;
use engine_core::{error::TableError, retry::RetryDisposition};

/// Maps a per-file fault onto the retry loop.
///
/// Structural facts about the file stop immediately; anything that smells
/// like the system being unwell is retried.
pub fn classify_file_fault(err: &FileFault) -> RetryDisposition {
    match err {
        FileFault::Read(e) => classify_file_error(e),
        FileFault::Parse(_) => RetryDisposition::Stop,
        FileFault::Duplicate => RetryDisposition::Stop,
        FileFault::Classify(_) => RetryDisposition::Stop,
        FileFault::Routing(e) => classify_routing_error(e),
        FileFault::Config(_) => RetryDisposition::Retry,
        FileFault::Table(e) => classify_table_error(e),
        FileFault::State(_) => RetryDisposition::Retry,
        FileFault::Move(e) => classify_file_error(e),
    }
}

pub fn classify_file_error(err: &FileError) -> RetryDisposition {
    match err {
        FileError::IoError(_) | FileError::Unavailable(_) => RetryDisposition::Retry,
        FileError::NotFound(_)
        | FileError::InvalidFormat { .. }
        | FileError::CsvError(_)
        | FileError::Workbook(_) => RetryDisposition::Stop,
    }
}

fn classify_routing_error(err: &RoutingError) -> RetryDisposition {
    match err {
        RoutingError::MissingReference(_) | RoutingError::SampleColumnOutOfRange { .. } => {
            RetryDisposition::Retry
        }
    }
}

fn classify_table_error(err: &TableError) -> RetryDisposition {
    match err {
        TableError::Io(_) | TableError::Csv(_) => RetryDisposition::Retry,
        TableError::NotFound(_) | TableError::AlreadyExists(_) | TableError::Truncate { .. } => {
            RetryDisposition::Retry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifyError;

    #[test]
    fn structural_faults_stop() {
        assert_eq!(
            classify_file_fault(&FileFault::Duplicate),
            RetryDisposition::Stop
        );
        assert_eq!(
            classify_file_fault(&FileFault::Classify(ClassifyError::Unknown {
                file: "x.csv".into()
            })),
            RetryDisposition::Stop
        );
        assert_eq!(
            classify_file_fault(&FileFault::Parse(FileError::InvalidFormat {
                name: "x".into(),
                reason: "empty".into()
            })),
            RetryDisposition::Stop
        );
    }

    #[test]
    fn infrastructure_faults_retry() {
        let io = std::io::Error::other("disk hiccup");
        assert_eq!(
            classify_file_fault(&FileFault::Read(FileError::IoError(io))),
            RetryDisposition::Retry
        );
        assert_eq!(
            classify_file_fault(&FileFault::Routing(RoutingError::MissingReference(
                "BA Produk LAZ".parse().unwrap()
            ))),
            RetryDisposition::Retry
        );
    }
}
