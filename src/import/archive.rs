//! ZIP expansion.
//!
//! Entries are filtered, read sequentially, then normalized on the rayon
//! pool. Results keep archive order. Every document carries the containing
//! archive name and the raw entry path.

use std::io::{Cursor, Read};

use rayon::prelude::*;
use zip::ZipArchive;

use super::{Importer, RawFile, detect_format, sanitize_filename};
use crate::core::*;

/// How many rejected names the zero-eligible message lists.
const REJECTED_SHOWN: usize = 5;

/// Directory entries and OS metadata never reach a parser.
pub fn is_rejected_entry(path: &str) -> bool {
    let base = path.rsplit(['/', '\\']).next().unwrap_or(path);
    path.ends_with('/')
        || path.starts_with("__MACOSX/")
        || path.contains("/__MACOSX/")
        || base.is_empty()
        || base.starts_with("._")
        || base == ".DS_Store"
        || base.eq_ignore_ascii_case("Thumbs.db")
}

struct Entry {
    internal_path: String,
    file: RawFile,
}

impl Importer {
    /// Expand an archive found at nesting `level` (1 for a top-level ZIP).
    pub(super) fn expand(&self, archive: &RawFile, level: usize) -> Vec<ImportedDocument> {
        let fail = |message: String| {
            log::warn!("{}: {message}", archive.name);
            vec![ImportedDocument::failed(DocumentKind::Zip, &archive.name, archive.size(), message)]
        };

        let mut zip = match ZipArchive::new(Cursor::new(archive.bytes.as_slice())) {
            Ok(zip) => zip,
            Err(e) => return fail(AuditError::Archive(format!("ZIP ilegível: {e}")).to_string()),
        };

        let mut eligible = Vec::new();
        let mut rejected: Vec<String> = Vec::new();
        for index in 0..zip.len() {
            let mut entry = match zip.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("{}: entry #{index} unreadable: {e}", archive.name);
                    rejected.push(format!("#{index}"));
                    continue;
                }
            };
            let raw_path = entry.name().to_string();
            if entry.is_dir() || is_rejected_entry(&raw_path) {
                rejected.push(raw_path);
                continue;
            }

            let base = raw_path.rsplit(['/', '\\']).next().unwrap_or(&raw_path);
            let kind = detect_format(base, None);
            let too_deep = kind == DocumentKind::Zip && level >= self.config.max_archive_depth;
            if kind == DocumentKind::Unsupported || too_deep {
                rejected.push(raw_path);
                continue;
            }

            let mut bytes = Vec::new();
            if let Err(e) = entry.read_to_end(&mut bytes) {
                log::warn!("{}: {raw_path}: {e}", archive.name);
                rejected.push(raw_path);
                continue;
            }
            log::debug!("{}: entry {raw_path} ({kind:?}, {} bytes)", archive.name, bytes.len());
            eligible.push(Entry {
                file: RawFile::new(sanitize_filename(base), bytes),
                internal_path: raw_path,
            });
        }

        if !rejected.is_empty() {
            log::warn!("{}: {} entries skipped", archive.name, rejected.len());
        }
        if eligible.is_empty() {
            return fail(no_eligible_message(&rejected));
        }

        let expanded: Vec<Vec<ImportedDocument>> = eligible
            .par_iter()
            .map(|entry| {
                if detect_format(&entry.file.name, None) == DocumentKind::Zip {
                    return self.expand(&entry.file, level + 1);
                }
                let provenance = Provenance {
                    source_archive: archive.name.clone(),
                    internal_path: entry.internal_path.clone(),
                };
                vec![self.normalize(&entry.file).with_provenance(provenance)]
            })
            .collect();
        expanded.into_iter().flatten().collect()
    }
}

fn no_eligible_message(rejected: &[String]) -> String {
    let mut message = String::from("O arquivo ZIP não contém documentos suportados (0 arquivos elegíveis).");
    if !rejected.is_empty() {
        let shown: Vec<&str> = rejected.iter().take(REJECTED_SHOWN).map(String::as_str).collect();
        message.push_str(" Arquivos ignorados: ");
        message.push_str(&shown.join(", "));
        if rejected.len() > REJECTED_SHOWN {
            message.push_str(&format!(" e mais {}", rejected.len() - REJECTED_SHOWN));
        }
        message.push('.');
    }
    message
}
