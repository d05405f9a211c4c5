//! Legacy code page table and text conversion.
//!
//! The header stores a one-byte code page id. [`encoding_for`] maps it to a
//! charset name and [`CodePage`] resolves that name to a text codec: DOS OEM
//! pages through the `oem_cp` tables, everything else through `encoding_rs`.

use std::borrow::Cow;
use std::fmt;

use encoding_rs::Encoding;
use oem_cp::code_table::{DECODING_TABLE_CP_MAP, ENCODING_TABLE_CP_MAP};
use oem_cp::{encode_string_checked, encode_string_lossy};

/// Charset name used when a code page id is unknown or unset.
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Code page id to charset name.
static CODE_PAGES: &[(u8, &str)] = &[
    (0x01, "cp437"),  // U.S. MS-DOS
    (0x02, "cp850"),  // International MS-DOS
    (0x03, "cp1252"), // Windows ANSI
    (0x08, "cp865"),  // Danish OEM
    (0x09, "cp437"),  // Dutch OEM
    (0x0A, "cp850"),  // Dutch OEM*
    (0x0B, "cp437"),  // Finnish OEM
    (0x0D, "cp437"),  // French OEM
    (0x0E, "cp850"),  // French OEM*
    (0x0F, "cp437"),  // German OEM
    (0x10, "cp850"),  // German OEM*
    (0x11, "cp437"),  // Italian OEM
    (0x12, "cp850"),  // Italian OEM*
    (0x13, "cp932"),  // Japanese Shift-JIS
    (0x14, "cp850"),  // Spanish OEM*
    (0x15, "cp437"),  // Swedish OEM
    (0x16, "cp850"),  // Swedish OEM*
    (0x17, "cp865"),  // Norwegian OEM
    (0x18, "cp437"),  // Spanish OEM
    (0x19, "cp437"),  // English OEM (Britain)
    (0x1A, "cp850"),  // English OEM (Britain)*
    (0x1B, "cp437"),  // English OEM (U.S.)
    (0x1C, "cp863"),  // French OEM (Canada)
    (0x1D, "cp850"),  // French OEM*
    (0x1F, "cp852"),  // Czech OEM
    (0x22, "cp852"),  // Hungarian OEM
    (0x23, "cp852"),  // Polish OEM
    (0x24, "cp860"),  // Portuguese OEM
    (0x25, "cp850"),  // Portuguese OEM*
    (0x26, "cp866"),  // Russian OEM
    (0x37, "cp850"),  // English OEM (U.S.)*
    (0x40, "cp852"),  // Romanian OEM
    (0x4D, "cp936"),  // Chinese GBK (PRC)
    (0x4E, "cp949"),  // Korean (ANSI/OEM)
    (0x4F, "cp950"),  // Chinese Big 5 (Taiwan)
    (0x50, "cp874"),  // Thai (ANSI/OEM)
    (0x57, "cp1252"), // ANSI
    (0x58, "cp1252"), // Western European ANSI
    (0x59, "cp1252"), // Spanish ANSI
    (0x64, "cp852"),  // Eastern European MS-DOS
    (0x65, "cp866"),  // Russian MS-DOS
    (0x66, "cp865"),  // Nordic MS-DOS
    (0x67, "cp861"),  // Icelandic MS-DOS
    (0x6A, "cp737"),  // Greek MS-DOS (437G)
    (0x6B, "cp857"),  // Turkish MS-DOS
    (0x6C, "cp863"),  // French-Canadian MS-DOS
    (0x78, "cp950"),  // Taiwan Big 5
    (0x79, "cp949"),  // Hangul (Wansung)
    (0x7A, "cp936"),  // PRC GBK
    (0x7B, "cp932"),  // Japanese Shift-JIS
    (0x7C, "cp874"),  // Thai Windows/MS-DOS
    (0x86, "cp737"),  // Greek OEM
    (0x87, "cp852"),  // Slovenian OEM
    (0x88, "cp857"),  // Turkish OEM
    (0xC8, "cp1250"), // Eastern European Windows
    (0xC9, "cp1251"), // Russian Windows
    (0xCA, "cp1254"), // Turkish Windows
    (0xCB, "cp1253"), // Greek Windows
    (0xCC, "cp1257"), // Baltic Windows
];

/// Returns the charset name for a code page id.
///
/// Unknown ids resolve to [`DEFAULT_ENCODING`].
pub fn encoding_for(code: u8) -> &'static str {
    CODE_PAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(DEFAULT_ENCODING)
}

/// Returns the first code page id mapped to `name`, or 0 when none is.
pub fn code_for(name: &str) -> u8 {
    CODE_PAGES
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(c, _)| *c)
        .unwrap_or(0)
}

/// Text codec behind a code page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextCodec {
    /// WHATWG encoding (Windows, CJK and Thai pages, UTF-8)
    Whatwg(&'static Encoding),
    /// DOS OEM page by number
    Oem(u16),
}

/// Resolves a charset name to a text codec.
///
/// The CJK and Thai pages need explicit aliases, DOS OEM pages come from the
/// `oem_cp` tables and Windows pages are reachable through WHATWG labels.
fn resolve_codec(name: &str) -> Option<TextCodec> {
    let whatwg = match name {
        "cp874" => Some(encoding_rs::WINDOWS_874),
        "cp932" => Some(encoding_rs::SHIFT_JIS),
        "cp936" => Some(encoding_rs::GBK),
        "cp949" => Some(encoding_rs::EUC_KR),
        "cp950" => Some(encoding_rs::BIG5),
        _ => None,
    };
    if let Some(encoding) = whatwg {
        return Some(TextCodec::Whatwg(encoding));
    }
    let oem = name
        .strip_prefix("cp")
        .and_then(|n| n.parse::<u16>().ok())
        .filter(|n| DECODING_TABLE_CP_MAP.get(n).is_some() && ENCODING_TABLE_CP_MAP.get(n).is_some());
    if let Some(number) = oem {
        return Some(TextCodec::Oem(number));
    }
    Encoding::for_label(name.as_bytes()).map(TextCodec::Whatwg)
}

/// Code page of a table: id, charset name and resolved text codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodePage {
    code: u8,
    name: &'static str,
    codec: TextCodec,
}

impl CodePage {
    /// Creates the code page for a header code page id.
    pub fn new(code: u8) -> Self {
        let name = encoding_for(code);
        let codec = resolve_codec(name).unwrap_or_else(|| {
            tracing::debug!(
                "Charset '{}' (code page 0x{:02X}) not supported, using {}",
                name,
                code,
                DEFAULT_ENCODING
            );
            TextCodec::Whatwg(encoding_rs::UTF_8)
        });
        Self { code, name, codec }
    }

    /// Creates the code page for a charset name via reverse lookup.
    pub fn from_name(name: &str) -> Self {
        Self::new(code_for(name))
    }

    /// Code page id as stored in the header.
    pub fn code(&self) -> u8 {
        self.code
    }

    /// Charset name of this code page.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `encoding_rs` encoding, or `None` for DOS OEM pages.
    pub fn encoding(&self) -> Option<&'static Encoding> {
        match self.codec {
            TextCodec::Whatwg(encoding) => Some(encoding),
            TextCodec::Oem(_) => None,
        }
    }

    /// Decodes raw field bytes to text, replacing malformed sequences.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self.codec {
            TextCodec::Whatwg(encoding) => encoding.decode_without_bom_handling(bytes).0,
            TextCodec::Oem(_) if bytes.is_ascii() => {
                Cow::Borrowed(std::str::from_utf8(bytes).unwrap_or_default())
            }
            TextCodec::Oem(number) => match DECODING_TABLE_CP_MAP.get(&number) {
                Some(table) => Cow::Owned(table.decode_string_lossy(bytes)),
                None => String::from_utf8_lossy(bytes),
            },
        }
    }

    /// Encodes text into the code page, substituting unmappable characters.
    pub fn encode<'a>(&self, text: &'a str) -> Cow<'a, [u8]> {
        match self.codec {
            TextCodec::Whatwg(encoding) => encoding.encode(text).0,
            TextCodec::Oem(_) if text.is_ascii() => Cow::Borrowed(text.as_bytes()),
            TextCodec::Oem(number) => match ENCODING_TABLE_CP_MAP.get(&number) {
                Some(table) => Cow::Owned(encode_string_lossy(text, table)),
                None => Cow::Borrowed(text.as_bytes()),
            },
        }
    }

    /// Encodes text into the code page, returning `None` when a character
    /// has no mapping.
    pub fn encode_strict<'a>(&self, text: &'a str) -> Option<Cow<'a, [u8]>> {
        match self.codec {
            TextCodec::Whatwg(encoding) => {
                let (bytes, _, had_errors) = encoding.encode(text);
                (!had_errors).then_some(bytes)
            }
            TextCodec::Oem(_) if text.is_ascii() => Some(Cow::Borrowed(text.as_bytes())),
            TextCodec::Oem(number) => ENCODING_TABLE_CP_MAP
                .get(&number)
                .and_then(|table| encode_string_checked(text, table))
                .map(Cow::Owned),
        }
    }
}

impl Default for CodePage {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Display for CodePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
