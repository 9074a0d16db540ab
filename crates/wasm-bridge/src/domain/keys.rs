//! # Storage Keys, Names and Entry Points
//!
//! Contract code, its language tag and its data share one store. Code and
//! description keys start with a NUL byte, which a valid contract name can
//! never produce, so they cannot collide with `<name>-<key>` data keys.

use crate::errors::BridgeError;
use std::fmt;

/// Method run once when a contract is deployed.
pub const INIT_METHOD: &str = "initialize";

/// Minimum contract name length.
pub const MIN_CONTRACT_NAME_LEN: usize = 4;

/// Maximum contract name length.
pub const MAX_CONTRACT_NAME_LEN: usize = 16;

const CODE_PREFIX: &[u8] = b"\0code\0";
const DESC_PREFIX: &[u8] = b"\0desc\0";

/// Key holding a contract's bytecode.
#[must_use]
pub fn contract_code_key(name: &str) -> Vec<u8> {
    [CODE_PREFIX, name.as_bytes()].concat()
}

/// Key holding a contract's language tag.
#[must_use]
pub fn contract_desc_key(name: &str) -> Vec<u8> {
    [DESC_PREFIX, name.as_bytes()].concat()
}

/// Key of a contract data object: `<contract-name>-<key>`.
#[must_use]
pub fn object_key(contract: &str, key: &[u8]) -> Vec<u8> {
    let mut composite = Vec::with_capacity(contract.len() + 1 + key.len());
    composite.extend_from_slice(contract.as_bytes());
    composite.push(b'-');
    composite.extend_from_slice(key);
    composite
}

/// Checks a contract name: 4-16 chars, starts with a letter or `_`, inner
/// chars alphanumeric, `_` or `.`, ends alphanumeric or `_`.
pub fn validate_contract_name(name: &str) -> Result<(), BridgeError> {
    let invalid = || BridgeError::InvalidContractName(name.to_string());
    let bytes = name.as_bytes();
    if bytes.len() < MIN_CONTRACT_NAME_LEN || bytes.len() > MAX_CONTRACT_NAME_LEN {
        return Err(invalid());
    }
    let first = bytes[0];
    let last = bytes[bytes.len() - 1];
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return Err(invalid());
    }
    if !(last.is_ascii_alphanumeric() || last == b'_') {
        return Err(invalid());
    }
    if !bytes[1..bytes.len() - 1]
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'.')
    {
        return Err(invalid());
    }
    Ok(())
}

/// Contract runtime family, derived from the language tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    /// Go compiled to wasm: single `run` entry, dispatches on method itself.
    Go,
    /// C/C++ (emscripten): one exported `_<method>` per method.
    C,
}

impl Language {
    /// Parses a language tag.
    pub fn parse(tag: &str) -> Result<Self, BridgeError> {
        match tag {
            "go" => Ok(Self::Go),
            "c" => Ok(Self::C),
            other => Err(BridgeError::UnsupportedLanguage(other.to_string())),
        }
    }

    /// Tag as stored alongside the code.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Go => "go",
            Self::C => "c",
        }
    }

    /// Entry symbol for `method`.
    #[must_use]
    pub fn entry_point(self, method: &str) -> String {
        match self {
            Self::Go => "run".to_string(),
            Self::C => format!("_{method}"),
        }
    }

    /// Parameters the entry symbol expects. Go's `run` takes `argc, argv`.
    #[must_use]
    pub fn entry_params(self) -> &'static [i64] {
        match self {
            Self::Go => &[0, 0],
            Self::C => &[],
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
