//! The uploaded file as handed over by the transport layer.

/// Raw upload bytes plus the declared (untrusted) filename.
///
/// Lives for one request only and is owned by the pipeline while it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAudio {
    filename: Option<String>,
    bytes: Vec<u8>,
}

impl UploadedAudio {
    pub fn new(filename: Option<String>, bytes: Vec<u8>) -> Self {
        Self { filename, bytes }
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

const MAX_STEM_CHARS: usize = 64;

/// Reduce a declared filename to a stem that is safe inside a temp path.
///
/// Drops any directory part and the extension, keeps ASCII letters, digits,
/// `-` and `_`, turns whitespace into `_`. Falls back to `"audio"`.
pub fn sanitize_stem(filename: &str) -> String {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => base,
    };

    let cleaned: String = stem
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .take(MAX_STEM_CHARS)
        .collect();

    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "audio".to_string()
    } else {
        cleaned.to_string()
    }
}
