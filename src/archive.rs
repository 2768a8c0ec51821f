//! Script file decoding
//!
//! A script file is either a plain list of lines, or a txtar-style archive
//! whose leading comment is the script and whose `-- name --` sections are
//! files to stage in the work directory. The section format itself is
//! handled by `emx-txtar`; this module only decides which form a file is in
//! and converts the result into owned `(name, bytes)` pairs.

use crate::error::ScriptError;

/// A decoded script: the body to interpret and the files to extract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    /// Script body
    pub comment: String,
    /// Embedded files, in archive order
    pub files: Vec<ArchiveFile>,
}

/// One embedded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Whether `data` contains a `-- name --` section marker line.
pub fn has_sections(data: &str) -> bool {
    data.lines().any(|line| {
        let line = line.trim_end_matches('\r');
        line.len() > 6
            && line.starts_with("-- ")
            && line.ends_with(" --")
            && !line[3..line.len() - 3].trim().is_empty()
    })
}

/// Decode a script file's contents.
pub fn decode(data: &str) -> Result<Archive, ScriptError> {
    if !has_sections(data) {
        return Ok(Archive {
            comment: data.to_string(),
            files: Vec::new(),
        });
    }

    let decoded = emx_txtar::Decoder::new()
        .decode(data)
        .map_err(|e| ScriptError::environment(format!("failed to parse archive: {}", e)))?;

    let files = decoded
        .files
        .iter()
        .map(|f| ArchiveFile {
            name: f.name.to_string(),
            data: AsRef::<[u8]>::as_ref(&f.data).to_vec(),
        })
        .collect();

    Ok(Archive {
        comment: decoded.comment.to_string(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_script_has_no_sections() {
        let src = "exists foo\n! exists bar\n";
        assert!(!has_sections(src));
        let ar = decode(src).unwrap();
        assert_eq!(ar.comment, src);
        assert!(ar.files.is_empty());
    }

    #[test]
    fn test_marker_needs_a_name() {
        assert!(!has_sections("-- --\n"));
        assert!(!has_sections("stdout -- \n"));
        assert!(has_sections("exists a\n-- a --\nx\n"));
    }

    #[test]
    fn test_decode_sections() {
        let src = "exists hello.txt\n-- hello.txt --\nhi\n-- dir/b.txt --\nb\n";
        let ar = decode(src).unwrap();
        assert_eq!(ar.comment, "exists hello.txt\n");
        assert_eq!(ar.files.len(), 2);
        assert_eq!(ar.files[0].name, "hello.txt");
        assert_eq!(ar.files[0].data, b"hi\n");
        assert_eq!(ar.files[1].name, "dir/b.txt");
    }
}
