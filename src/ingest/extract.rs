use crate::errors::WorkerError;

/// Plain text recovered from a raw document payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub source: String,
}

/// Turns raw document bytes into text.
///
/// The worker only ever sees extracted text, so format support lives
/// entirely behind this trait. Implementations must reject payloads they
/// cannot decode rather than silently dropping content.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, data: &[u8], source: &str) -> Result<Document, WorkerError>;
}

/// Extractor for documents that are already UTF-8 text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, data: &[u8], source: &str) -> Result<Document, WorkerError> {
        let text = String::from_utf8(data.to_vec())
            .map_err(|e| WorkerError::ingestion(format!("document is not valid UTF-8: {e}")))?;
        Ok(Document {
            text,
            source: source.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_utf8_text() {
        let doc = PlainTextExtractor
            .extract("○ first point".as_bytes(), "notes.txt")
            .unwrap();
        assert_eq!(doc.text, "○ first point");
        assert_eq!(doc.source, "notes.txt");
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = PlainTextExtractor
            .extract(&[0xff, 0xfe, 0x41], "blob")
            .unwrap_err();
        assert!(err.to_string().contains("ingestion failed"));
    }
}
