//! Text decoding of captured output.
//!
//! Output arrives in arbitrary chunks, so a multi-byte UTF-8 sequence can be
//! split across two reads. [`StreamDecoder`] carries the incomplete tail over
//! to the next chunk so the concatenated text equals decoding the whole stream
//! at once.

use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ProcessError;

/// Encoding used to turn output bytes into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// UTF-8, invalid sequences replaced with U+FFFD.
    #[default]
    Utf8,
    /// One byte per code point.
    Latin1,
    /// 7-bit ASCII, high bit stripped.
    Ascii,
    /// Lowercase hexadecimal, two digits per byte.
    Hex,
}

impl Encoding {
    /// Encoding name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf8",
            Self::Latin1 => "latin1",
            Self::Ascii => "ascii",
            Self::Hex => "hex",
        }
    }

    /// Incremental decoder for this encoding.
    pub const fn decoder(self) -> StreamDecoder {
        StreamDecoder {
            encoding: self,
            pending: Vec::new(),
        }
    }

    /// Decode a complete buffer.
    pub fn decode(self, bytes: &[u8]) -> String {
        let mut decoder = self.decoder();
        let mut text = decoder.push(bytes);
        text.push_str(&decoder.finish());
        text
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "latin1" | "binary" => Ok(Self::Latin1),
            "ascii" => Ok(Self::Ascii),
            "hex" => Ok(Self::Hex),
            other => Err(ProcessError::InvalidArgument(format!(
                "unknown encoding: {other}"
            ))),
        }
    }
}

/// Chunk-at-a-time decoder for one output stream.
#[derive(Debug, Clone)]
pub struct StreamDecoder {
    encoding: Encoding,
    pending: Vec<u8>,
}

impl StreamDecoder {
    /// Decode the next chunk, holding back an incomplete trailing sequence.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        match self.encoding {
            Encoding::Utf8 => self.push_utf8(chunk),
            Encoding::Latin1 => chunk.iter().copied().map(char::from).collect(),
            Encoding::Ascii => chunk.iter().map(|b| char::from(b & 0x7f)).collect(),
            Encoding::Hex => chunk.iter().fold(String::new(), |mut out, b| {
                let _ = write!(out, "{b:02x}");
                out
            }),
        }
    }

    /// Flush whatever is still held back.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }

    fn push_utf8(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut start = 0;
        while start < self.pending.len() {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.pending.len();
                }
                Err(err) => {
                    let valid_end = start + err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..start);
        out
    }
}
