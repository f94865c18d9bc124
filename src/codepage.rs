//! Legacy single-byte text encodings
//!
//! Many serial peripherals (printers, fiscal devices, embedded displays) expect text in a DOS or Windows code page
//! rather than UTF-8. A [`CodePage`] is restricted to encodings that map every character to exactly one byte, so the
//! encoded length equals the character count and packet boundaries never fall inside a character.

use encoding_rs::{EncoderResult, Encoding};

use crate::error::ErrorKind;
use crate::{Error, Result};

/// What to do with characters the code page cannot represent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum UnmappablePolicy {
    /// Fail with [`ErrorKind::Encoding`]
    #[default]
    Reject,
    /// Replace each unmappable character with `?`
    Substitute,
}

/// A single-byte legacy character encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct CodePage(&'static Encoding);

impl CodePage {
    /// Wraps `encoding`.
    ///
    /// Fails with [`ErrorKind::InvalidParameter`] if `encoding` is not a single-byte encoding.
    pub fn new(encoding: &'static Encoding) -> Result<Self> {
        if encoding.is_single_byte() {
            Ok(CodePage(encoding))
        } else {
            Err(Error::new(
                ErrorKind::InvalidParameter,
                None,
                format!("{} is not a single-byte encoding", encoding.name()),
            ))
        }
    }

    /// Looks up a code page by its WHATWG label, e.g. `windows-1250`, `cp1251`, `ibm866` or `latin2`.
    pub fn for_label(label: &str) -> Result<Self> {
        let encoding = Encoding::for_label(label.as_bytes()).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidParameter,
                None,
                format!("unknown encoding label `{label}`"),
            )
        })?;
        Self::new(encoding)
    }

    /// Central European Windows code page, the default
    pub fn windows_1250() -> Self {
        CodePage(encoding_rs::WINDOWS_1250)
    }

    /// The canonical name of the code page
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// The underlying `encoding_rs` encoding
    pub fn encoding(&self) -> &'static Encoding {
        self.0
    }

    /// Encodes `text`, one byte per character.
    pub fn encode(&self, text: &str, policy: UnmappablePolicy) -> Result<Vec<u8>> {
        let mut encoder = self.0.new_encoder();
        let mut out = Vec::new();
        let mut rest = text;
        loop {
            out.reserve(
                encoder
                    .max_buffer_length_from_utf8_without_replacement(rest.len())
                    .unwrap_or(rest.len()),
            );
            let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(rest, &mut out, true);
            rest = &rest[read..];
            match result {
                EncoderResult::InputEmpty => return Ok(out),
                EncoderResult::OutputFull => {}
                EncoderResult::Unmappable(c) => match policy {
                    UnmappablePolicy::Reject => {
                        return Err(Error::new(
                            ErrorKind::Encoding,
                            None,
                            format!("{:?} (U+{:04X}) is not representable in {}", c, c as u32, self.name()),
                        ))
                    }
                    UnmappablePolicy::Substitute => out.push(b'?'),
                },
            }
        }
    }

    /// Decodes `bytes`. Every byte value decodes to some character.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, _) = self.0.decode_without_bom_handling(bytes);
        text.into_owned()
    }
}

impl Default for CodePage {
    fn default() -> Self {
        Self::windows_1250()
    }
}

impl std::fmt::Debug for CodePage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CodePage").field(&self.name()).finish()
    }
}

impl std::fmt::Display for CodePage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CodePage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::for_label(s)
    }
}

impl TryFrom<String> for CodePage {
    type Error = Error;

    fn try_from(label: String) -> Result<Self> {
        Self::for_label(&label)
    }
}

impl From<CodePage> for String {
    fn from(code_page: CodePage) -> Self {
        code_page.name().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_identity() {
        let cp = CodePage::default();
        assert_eq!(cp.encode("test", UnmappablePolicy::Reject).unwrap(), b"test");
        assert_eq!(cp.encode("", UnmappablePolicy::Reject).unwrap(), b"");
    }

    #[test]
    fn central_european_letters_are_single_bytes() {
        let cp = CodePage::windows_1250();
        let bytes = cp.encode("Łódź", UnmappablePolicy::Reject).unwrap();
        assert_eq!(bytes, [0xA3, 0xF3, 0x64, 0x9F]);
        assert_eq!(cp.decode(&bytes), "Łódź");
    }

    #[test]
    fn unmappable_characters_are_rejected_by_default() {
        let err = CodePage::default()
            .encode("price: 5日", UnmappablePolicy::Reject)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
        assert!(err.message().contains("U+65E5"));
    }

    #[test]
    fn unmappable_characters_can_be_substituted() {
        let bytes = CodePage::default()
            .encode("a日b語c", UnmappablePolicy::Substitute)
            .unwrap();
        assert_eq!(bytes, b"a?b?c");
    }

    #[test]
    fn multi_byte_encodings_are_refused() {
        assert_eq!(
            CodePage::new(encoding_rs::UTF_8).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(
            CodePage::for_label("shift_jis").unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(
            CodePage::for_label("no-such-code-page").unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
    }

    #[test]
    fn labels_resolve_to_canonical_names() {
        assert_eq!(CodePage::for_label("cp1250").unwrap(), CodePage::windows_1250());
        let dos = "cp866".parse::<CodePage>().unwrap();
        assert_eq!(dos.name(), "IBM866");
        assert_eq!(dos.encode("А", UnmappablePolicy::Reject).unwrap(), [0x80]);
    }
}
