//! Persisted Bundle Format
//!
//! Binary: `b"TXB\0"` magic, postcard `u32` format version, postcard bundle.
//! JSON (`.json` files): `{"format_version": N, "bundle": {...}}`.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bundle::TransformationBundle;
use crate::BundleLoadError;

/// Format version written by this build and the only one it reads
pub const FORMAT_VERSION: u32 = 1;

const MAGIC: &[u8; 4] = b"TXB\0";

/// On-disk encoding of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleFormat {
    Binary,
    Json,
}

impl BundleFormat {
    /// `.json` selects JSON, anything else binary
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => BundleFormat::Json,
            _ => BundleFormat::Binary,
        }
    }
}

#[derive(Serialize)]
struct JsonEnvelopeRef<'a> {
    format_version: u32,
    bundle: &'a TransformationBundle,
}

#[derive(Deserialize)]
struct JsonEnvelope {
    format_version: u32,
    bundle: serde_json::Value,
}

fn check_version(found: u32) -> Result<(), BundleLoadError> {
    if found != FORMAT_VERSION {
        return Err(BundleLoadError::IncompatibleVersion {
            found,
            supported: FORMAT_VERSION,
        });
    }
    Ok(())
}

/// Serialize a bundle
pub fn to_bytes(
    bundle: &TransformationBundle,
    format: BundleFormat,
) -> Result<Vec<u8>, BundleLoadError> {
    match format {
        BundleFormat::Binary => {
            let mut out = MAGIC.to_vec();
            let version = postcard::to_allocvec(&FORMAT_VERSION)
                .map_err(|e| BundleLoadError::Serialization(e.to_string()))?;
            let body = postcard::to_allocvec(bundle)
                .map_err(|e| BundleLoadError::Serialization(e.to_string()))?;
            out.extend_from_slice(&version);
            out.extend_from_slice(&body);
            Ok(out)
        }
        BundleFormat::Json => serde_json::to_vec_pretty(&JsonEnvelopeRef {
            format_version: FORMAT_VERSION,
            bundle,
        })
        .map_err(|e| BundleLoadError::Serialization(e.to_string())),
    }
}

/// Deserialize and validate a bundle
pub fn from_bytes(
    bytes: &[u8],
    format: BundleFormat,
) -> Result<TransformationBundle, BundleLoadError> {
    let bundle: TransformationBundle = match format {
        BundleFormat::Binary => {
            let rest = bytes
                .strip_prefix(MAGIC.as_slice())
                .ok_or_else(|| BundleLoadError::Corrupt("missing bundle header".to_string()))?;
            let (version, body) = postcard::take_from_bytes::<u32>(rest)
                .map_err(|e| BundleLoadError::Corrupt(format!("unreadable version: {e}")))?;
            check_version(version)?;
            postcard::from_bytes(body).map_err(|e| BundleLoadError::Corrupt(e.to_string()))?
        }
        BundleFormat::Json => {
            let envelope: JsonEnvelope = serde_json::from_slice(bytes)
                .map_err(|e| BundleLoadError::Corrupt(e.to_string()))?;
            check_version(envelope.format_version)?;
            serde_json::from_value(envelope.bundle)
                .map_err(|e| BundleLoadError::Corrupt(e.to_string()))?
        }
    };

    bundle.validate()?;
    Ok(bundle)
}

/// Read, decode and validate a bundle file
pub fn load(path: impl AsRef<Path>) -> Result<TransformationBundle, BundleLoadError> {
    let path = path.as_ref();
    let format = BundleFormat::from_path(path);

    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => BundleLoadError::NotFound(path.to_path_buf()),
        _ => BundleLoadError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());

    let bundle = from_bytes(&bytes, format)?;
    info!(
        "Loaded bundle {:?} from {} ({:?}, v{}, {} features, {})",
        bundle.metadata().name,
        path.display(),
        format,
        FORMAT_VERSION,
        bundle.pipeline().canonical_order().len(),
        bundle.model().kind()
    );
    Ok(bundle)
}

/// Write a bundle, choosing the format from the file extension
pub fn save(bundle: &TransformationBundle, path: impl AsRef<Path>) -> Result<(), BundleLoadError> {
    let path = path.as_ref();
    let bytes = to_bytes(bundle, BundleFormat::from_path(path))?;
    std::fs::write(path, &bytes).map_err(|e| BundleLoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!("Saved bundle {:?} to {}", bundle.metadata().name, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use tempfile::tempdir;

    #[test]
    fn test_format_from_path() {
        assert_eq!(BundleFormat::from_path(Path::new("m/bundle.json")), BundleFormat::Json);
        assert_eq!(BundleFormat::from_path(Path::new("m/bundle.JSON")), BundleFormat::Json);
        assert_eq!(BundleFormat::from_path(Path::new("m/bundle.bin")), BundleFormat::Binary);
        assert_eq!(BundleFormat::from_path(Path::new("m/bundle")), BundleFormat::Binary);
    }

    #[test]
    fn test_binary_roundtrip() {
        for bundle in [
            fixtures::loan_bundle(),
            fixtures::car_price_bundle(),
            fixtures::bankruptcy_bundle(),
        ] {
            let bytes = to_bytes(&bundle, BundleFormat::Binary).unwrap();
            assert!(bytes.starts_with(MAGIC));
            assert_eq!(from_bytes(&bytes, BundleFormat::Binary).unwrap(), bundle);
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let bundle = fixtures::loan_bundle();
        let bytes = to_bytes(&bundle, BundleFormat::Json).unwrap();
        assert_eq!(from_bytes(&bytes, BundleFormat::Json).unwrap(), bundle);
    }

    #[test]
    fn test_save_and_load_file() {
        let bundle = fixtures::car_price_bundle();
        let dir = tempdir().unwrap();
        for name in ["car.bin", "car.json"] {
            let path = dir.path().join(name);
            save(&bundle, &path).unwrap();
            assert_eq!(load(&path).unwrap(), bundle);
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = load(dir.path().join("does-not-exist.bin")).unwrap_err();
        assert!(matches!(err, BundleLoadError::NotFound(_)));
    }

    #[test]
    fn test_corrupt_content() {
        let err = from_bytes(b"definitely not a bundle", BundleFormat::Binary).unwrap_err();
        assert!(matches!(err, BundleLoadError::Corrupt(_)));

        let mut truncated = to_bytes(&fixtures::loan_bundle(), BundleFormat::Binary).unwrap();
        truncated.truncate(truncated.len() / 2);
        let err = from_bytes(&truncated, BundleFormat::Binary).unwrap_err();
        assert!(matches!(err, BundleLoadError::Corrupt(_)));

        let err = from_bytes(b"{not json", BundleFormat::Json).unwrap_err();
        assert!(matches!(err, BundleLoadError::Corrupt(_)));
    }

    #[test]
    fn test_incompatible_version() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&postcard::to_allocvec(&7u32).unwrap());
        let err = from_bytes(&bytes, BundleFormat::Binary).unwrap_err();
        assert!(matches!(
            err,
            BundleLoadError::IncompatibleVersion {
                found: 7,
                supported: FORMAT_VERSION
            }
        ));

        let json = br#"{"format_version": 2, "bundle": {}}"#;
        let err = from_bytes(json, BundleFormat::Json).unwrap_err();
        assert!(matches!(err, BundleLoadError::IncompatibleVersion { found: 2, .. }));
    }

    #[test]
    fn test_inconsistent_bundle_rejected_on_load() {
        let bundle = fixtures::loan_bundle();
        let mut value = serde_json::to_value(&JsonEnvelopeRef {
            format_version: FORMAT_VERSION,
            bundle: &bundle,
        })
        .unwrap();
        value["bundle"]["pipeline"]["canonical_order"][0] = "Not_A_Column".into();

        let bytes = serde_json::to_vec(&value).unwrap();
        let err = from_bytes(&bytes, BundleFormat::Json).unwrap_err();
        assert!(matches!(err, BundleLoadError::Invalid(_)));
    }
}
