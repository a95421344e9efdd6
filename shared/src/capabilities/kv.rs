//! Key-value persistence requests. The core keeps two things on the
//! device: the bearer token under `session:token` and user preferences
//! under `settings:preferences`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::marker::PhantomData;
use thiserror::Error;

pub const MAX_KEY_LENGTH: usize = 128;
pub const MAX_VALUE_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyNamespace {
    Session,
    Settings,
}

impl KeyNamespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Settings => "settings",
        }
    }
}

/// A key inside one namespace. Stores see the joined `prefix:key` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KvKey {
    namespace: KeyNamespace,
    key: String,
}

impl KvKey {
    /// Keys are short ASCII identifiers: letters, digits, `-`, `_` and `.`,
    /// never starting with a dot.
    pub fn new(namespace: KeyNamespace, key: impl Into<String>) -> Result<Self, KvError> {
        let key = key.into();
        let reason = if key.is_empty() {
            Some("empty")
        } else if key.len() > MAX_KEY_LENGTH {
            Some("too long")
        } else if key.starts_with('.') {
            Some("leading dot")
        } else if !key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        {
            Some("unsupported character")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(KvError::InvalidKey {
                key: key.escape_default().take(64).collect(),
                reason: reason.to_string(),
            }),
            None => Ok(Self { namespace, key }),
        }
    }

    pub fn raw(&self) -> String {
        format!("{}:{}", self.namespace.prefix(), self.key)
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Bytes read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvValue {
    data: Vec<u8>,
}

impl KvValue {
    pub fn new(data: Vec<u8>) -> Result<Self, KvError> {
        check_size(data.len())?;
        Ok(Self { data })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, KvError> {
        serde_json::from_slice(&self.data).map_err(|e| KvError::Json {
            message: e.to_string(),
        })
    }
}

fn check_size(size: usize) -> Result<(), KvError> {
    if size > MAX_VALUE_SIZE {
        return Err(KvError::ValueTooLarge {
            size,
            max: MAX_VALUE_SIZE,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum KvOperation {
    Get {
        key: KvKey,
    },
    /// Overwrites whatever the key held.
    Set {
        key: KvKey,
        value: Vec<u8>,
    },
    Delete {
        key: KvKey,
    },
    Exists {
        key: KvKey,
    },
}

impl KvOperation {
    pub fn get(namespace: KeyNamespace, key: impl Into<String>) -> Result<Self, KvError> {
        Ok(Self::Get {
            key: KvKey::new(namespace, key)?,
        })
    }

    pub fn set(
        namespace: KeyNamespace,
        key: impl Into<String>,
        value: Vec<u8>,
    ) -> Result<Self, KvError> {
        check_size(value.len())?;
        Ok(Self::Set {
            key: KvKey::new(namespace, key)?,
            value,
        })
    }

    pub fn delete(namespace: KeyNamespace, key: impl Into<String>) -> Result<Self, KvError> {
        Ok(Self::Delete {
            key: KvKey::new(namespace, key)?,
        })
    }

    pub fn exists(namespace: KeyNamespace, key: impl Into<String>) -> Result<Self, KvError> {
        Ok(Self::Exists {
            key: KvKey::new(namespace, key)?,
        })
    }

    pub fn key(&self) -> &KvKey {
        match self {
            Self::Get { key } | Self::Set { key, .. } | Self::Delete { key } | Self::Exists { key } => {
                key
            }
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum KvError {
    #[error("bad key {key}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("value is {size} bytes, limit {max}")]
    ValueTooLarge { size: usize, max: usize },

    #[error("storage failed ({code:?}): {message}")]
    Storage {
        code: StorageErrorCode,
        message: String,
    },

    #[error("stored value is not valid JSON: {message}")]
    Json { message: String },

    #[error("store answered {operation} where a value was expected")]
    UnexpectedOutput { operation: String },
}

impl KvError {
    pub fn storage(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self::Storage {
            code,
            message: message.into(),
        }
    }
}

/// Backend-neutral failure class for a store error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageErrorCode {
    Unknown,
    Corrupted,
    DiskFull,
    PermissionDenied,
    Busy,
    Locked,
    IoError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "output", rename_all = "snake_case")]
pub enum KvOutput {
    Value { value: Option<KvValue> },
    Written,
    Deleted { existed: bool },
    Exists { exists: bool },
}

pub type KvResult = Result<KvOutput, KvError>;

/// JSON-encoded values of one type in one namespace.
pub struct TypedKvStore<T> {
    namespace: KeyNamespace,
    _marker: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> TypedKvStore<T> {
    pub const fn new(namespace: KeyNamespace) -> Self {
        Self {
            namespace,
            _marker: PhantomData,
        }
    }

    pub fn get_op(&self, key: impl Into<String>) -> Result<KvOperation, KvError> {
        KvOperation::get(self.namespace, key)
    }

    pub fn set_op(&self, key: impl Into<String>, value: &T) -> Result<KvOperation, KvError> {
        let data = serde_json::to_vec(value).map_err(|e| KvError::Json {
            message: e.to_string(),
        })?;
        KvOperation::set(self.namespace, key, data)
    }

    /// `Ok(None)` when nothing is stored yet.
    pub fn parse_value(&self, output: KvOutput) -> Result<Option<T>, KvError> {
        match output {
            KvOutput::Value { value: Some(stored) } => stored.deserialize().map(Some),
            KvOutput::Value { value: None } => Ok(None),
            other => Err(KvError::UnexpectedOutput {
                operation: format!("{other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_short_identifiers() {
        for bad in ["", "../etc/passwd", "/abs", ".hidden", "key\0value", "two words"] {
            assert!(
                matches!(KvKey::new(KeyNamespace::Settings, bad), Err(KvError::InvalidKey { .. })),
                "{bad:?} should be rejected"
            );
        }
        assert!(KvKey::new(KeyNamespace::Settings, "a".repeat(MAX_KEY_LENGTH + 1)).is_err());
        assert!(KvKey::new(KeyNamespace::Settings, "preferences.v2").is_ok());
    }

    #[test]
    fn test_raw_key_carries_namespace() {
        let token = KvKey::new(KeyNamespace::Session, "token").unwrap();
        assert_eq!(token.raw(), "session:token");
        assert_eq!(token.key(), "token");
        let prefs = KvKey::new(KeyNamespace::Settings, "preferences").unwrap();
        assert_eq!(prefs.raw(), "settings:preferences");
    }

    #[test]
    fn test_value_size_limit() {
        let result = KvValue::new(vec![0u8; MAX_VALUE_SIZE + 1]);
        assert!(matches!(result, Err(KvError::ValueTooLarge { .. })));
        assert!(KvOperation::set(KeyNamespace::Settings, "k", vec![0u8; MAX_VALUE_SIZE + 1]).is_err());
    }

    #[test]
    fn test_typed_store_parses_value() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Prefs {
            timeframe: String,
        }

        let store: TypedKvStore<Prefs> = TypedKvStore::new(KeyNamespace::Settings);
        let op = store
            .set_op("leaderboard", &Prefs { timeframe: "week".into() })
            .unwrap();
        let KvOperation::Set { key, value } = op else {
            panic!("expected Set operation");
        };
        assert_eq!(key.raw(), "settings:leaderboard");

        let output = KvOutput::Value {
            value: Some(KvValue::new(value).unwrap()),
        };
        let parsed = store.parse_value(output).unwrap();
        assert_eq!(parsed, Some(Prefs { timeframe: "week".into() }));

        assert_eq!(store.parse_value(KvOutput::Value { value: None }).unwrap(), None);
        assert!(store.parse_value(KvOutput::Written).is_err());

        let garbage = KvOutput::Value {
            value: Some(KvValue::new(b"{not json".to_vec()).unwrap()),
        };
        assert!(matches!(store.parse_value(garbage), Err(KvError::Json { .. })));
    }
}
