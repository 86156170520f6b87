//! TR-013: Build records: what was generated, when, and the hash of the result.
//!
//! Sources and records are written atomically (temp file, then rename) so a
//! crashed build never leaves a truncated program next to a valid record.

use super::hasher;
use crate::codegen::GeneratedProgram;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Metadata written next to every generated program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Record schema version
    pub schema: String,

    /// Generated application type
    pub app: String,

    /// Build identifier, 16 hex digits
    pub app_id: String,

    /// Timestamp from the footer marker
    pub generated_at: String,

    /// Generator name and version
    pub generator: String,

    /// BLAKE3 hash of the generated source
    pub source_hash: String,

    /// Query entry points
    #[serde(default)]
    pub queries: Vec<String>,

    /// Service members wired up
    #[serde(default)]
    pub services: Vec<String>,

    /// Call wrappers emitted
    #[serde(default)]
    pub wrappers: Vec<String>,
}

/// Whether a program on disk still matches its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    /// Hash matches the record
    Fresh,
    /// Source was edited after generation
    Modified { expected: String, actual: String },
    /// The program file is gone
    Missing,
}

/// Derive the record path for a generated source file: `app.rs` -> `app.rs.build.yaml`.
pub fn record_path(source: &Path) -> PathBuf {
    let mut name = source.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".build.yaml");
    source.with_file_name(name)
}

/// Create the record for a freshly generated program.
pub fn new_record(program: &GeneratedProgram) -> BuildRecord {
    BuildRecord {
        schema: "1.0".to_string(),
        app: program.app_name.clone(),
        app_id: format!("{:016x}", program.app_id),
        generated_at: program.generated_at.clone(),
        generator: format!("tron {}", env!("CARGO_PKG_VERSION")),
        source_hash: hasher::hash_string(&program.source),
        queries: program.queries.clone(),
        services: program.services.clone(),
        wrappers: program.wrappers.clone(),
    }
}

/// Load the record for a source file. Returns None if it doesn't exist.
pub fn load_record(source: &Path) -> Result<Option<BuildRecord>, String> {
    let path = record_path(source);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let record: BuildRecord = serde_yaml_ng::from_str(&content)
        .map_err(|e| format!("invalid build record {}: {}", path.display(), e))?;
    Ok(Some(record))
}

/// Save the record for a source file atomically.
pub fn save_record(source: &Path, record: &BuildRecord) -> Result<PathBuf, String> {
    let path = record_path(source);
    let yaml = serde_yaml_ng::to_string(record).map_err(|e| format!("serialize error: {}", e))?;
    write_atomic(&path, &yaml)?;
    Ok(path)
}

/// Write the generated program and its record.
pub fn write_program(source: &Path, program: &GeneratedProgram) -> Result<BuildRecord, String> {
    write_atomic(source, &program.source)?;
    let record = new_record(program);
    save_record(source, &record)?;
    Ok(record)
}

/// Compare the source on disk with the hash in its record.
pub fn check_source(source: &Path, record: &BuildRecord) -> Result<SourceStatus, String> {
    if !source.exists() {
        return Ok(SourceStatus::Missing);
    }
    let actual = hasher::hash_file(source)?;
    if actual == record.source_hash {
        Ok(SourceStatus::Fresh)
    } else {
        Ok(SourceStatus::Modified {
            expected: record.source_hash.clone(),
            actual,
        })
    }
}

/// Atomic write: temp file + rename.
fn write_atomic(path: &Path, content: &str) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create dir {}: {}", parent.display(), e))?;
    }
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, content)
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        format!(
            "cannot rename {} -> {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> GeneratedProgram {
        GeneratedProgram {
            app_id: 0xBEEF,
            app_name: "KvApp".to_string(),
            module: "kv_app".to_string(),
            generated_at: "2026-10-16 09:30:00".to_string(),
            source: "pub mod kv_app {}\n".to_string(),
            queries: vec!["lookup".to_string()],
            services: vec!["kv".to_string()],
            wrappers: vec!["Call_SimpleKv_read".to_string()],
        }
    }

    #[test]
    fn test_tr013_record_path() {
        assert_eq!(
            record_path(Path::new("/out/app.rs")),
            PathBuf::from("/out/app.rs.build.yaml")
        );
    }

    #[test]
    fn test_tr013_new_record() {
        let record = new_record(&program());
        assert_eq!(record.app, "KvApp");
        assert_eq!(record.app_id, "000000000000beef");
        assert!(record.generator.starts_with("tron "));
        assert_eq!(record.source_hash, hasher::hash_string("pub mod kv_app {}\n"));
        assert_eq!(record.wrappers, vec!["Call_SimpleKv_read"]);
    }

    #[test]
    fn test_tr013_write_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("gen").join("app.rs");
        let written = write_program(&source, &program()).unwrap();

        assert_eq!(std::fs::read_to_string(&source).unwrap(), "pub mod kv_app {}\n");
        let loaded = load_record(&source).unwrap().unwrap();
        assert_eq!(loaded, written);
    }

    #[test]
    fn test_tr013_atomic_write_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("app.rs");
        write_program(&source, &program()).unwrap();
        assert!(!dir.path().join("app.rs.tmp").exists());
        assert!(!dir.path().join("app.rs.build.yaml.tmp").exists());
        assert!(record_path(&source).exists());
    }

    #[test]
    fn test_tr013_load_nonexistent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_record(&dir.path().join("ghost.rs")).unwrap().is_none());
    }

    #[test]
    fn test_tr013_load_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("app.rs");
        std::fs::write(record_path(&source), "app: [unterminated").unwrap();
        let err = load_record(&source).unwrap_err();
        assert!(err.contains("invalid build record"));
    }

    #[test]
    fn test_tr013_check_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("app.rs");
        let record = write_program(&source, &program()).unwrap();
        assert_eq!(check_source(&source, &record).unwrap(), SourceStatus::Fresh);

        std::fs::write(&source, "// edited\n").unwrap();
        assert!(matches!(
            check_source(&source, &record).unwrap(),
            SourceStatus::Modified { .. }
        ));

        std::fs::remove_file(&source).unwrap();
        assert_eq!(check_source(&source, &record).unwrap(), SourceStatus::Missing);
    }
}
