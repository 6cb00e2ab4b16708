//! Files uploaded with a `multipart/form-data` request

use crate::{
    errors::{Error, Result},
    http::stream::MemoryStream,
};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Upload status codes reported by the server for each file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum UploadError {
    /// The file was uploaded successfully.
    #[default]
    Ok = 0,
    /// The file exceeds the server's upload size limit.
    IniSize = 1,
    /// The file exceeds the size limit declared by the form.
    FormSize = 2,
    /// The file was only partially uploaded.
    Partial = 3,
    /// No file was uploaded for the field.
    NoFile = 4,
    /// The server has no temporary directory.
    NoTmpDir = 6,
    /// The server failed to write the file to disk.
    CantWrite = 7,
    /// A server extension stopped the upload.
    Extension = 8,
}

impl UploadError {
    pub fn from_code(code: u64) -> Result<Self> {
        Ok(match code {
            0 => Self::Ok,
            1 => Self::IniSize,
            2 => Self::FormSize,
            3 => Self::Partial,
            4 => Self::NoFile,
            6 => Self::NoTmpDir,
            7 => Self::CantWrite,
            8 => Self::Extension,
            _ => return Err(Error::invalid(format!("unknown upload error code {code}"))),
        })
    }

    #[inline]
    pub const fn code(&self) -> u8 {
        *self as u8
    }
}

/// A file received with the request, still in its temporary location.
///
/// The contents can be read with [`stream`](UploadedFile::stream) until the
/// file is moved; [`move_to`](UploadedFile::move_to) succeeds at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    file: PathBuf,
    size: Option<u64>,
    error: UploadError,
    client_filename: Option<String>,
    client_media_type: Option<String>,
    moved: bool,
}

impl UploadedFile {
    pub fn new<P: Into<PathBuf>>(
        file: P,
        size: Option<u64>,
        error: UploadError,
        client_filename: Option<String>,
        client_media_type: Option<String>,
    ) -> Self {
        Self {
            file: file.into(),
            size,
            error,
            client_filename,
            client_media_type,
            moved: false,
        }
    }

    /// Builds a file from one upload-metadata record
    /// (`tmp_name`, `size`, `error`, `name`, `type`).
    fn from_metadata(record: &Map<String, Value>) -> Result<Self> {
        let text = |key: &str| match record.get(key) {
            Some(Value::String(value)) => Some(value.clone()),
            _ => None,
        };
        let number = |key: &str| match record.get(key) {
            Some(Value::Number(value)) => value.as_u64(),
            Some(Value::String(value)) => value.trim().parse().ok(),
            _ => None,
        };

        let error = UploadError::from_code(number("error").unwrap_or(0))?;
        Ok(Self::new(
            text("tmp_name").unwrap_or_default(),
            number("size"),
            error,
            text("name"),
            text("type"),
        ))
    }
}

// Public API
impl UploadedFile {
    /// Temporary location of the file (or its destination once moved).
    #[inline]
    pub fn path(&self) -> &Path {
        &self.file
    }

    #[inline]
    pub const fn size(&self) -> Option<u64> {
        self.size
    }

    #[inline]
    pub const fn error(&self) -> UploadError {
        self.error
    }

    /// File name sent by the client. Do not trust it for filesystem paths.
    #[inline]
    pub fn client_filename(&self) -> Option<&str> {
        self.client_filename.as_deref()
    }

    #[inline]
    pub fn client_media_type(&self) -> Option<&str> {
        self.client_media_type.as_deref()
    }

    #[inline]
    pub const fn is_moved(&self) -> bool {
        self.moved
    }

    /// Opens the file contents as a read-only stream.
    pub fn stream(&self) -> Result<MemoryStream> {
        if self.moved {
            return Err(Error::Runtime(format!(
                "cannot open `{}`: the uploaded file has been moved",
                self.file.display()
            )));
        }

        let bytes = fs::read(&self.file).map_err(|err| {
            Error::stream(format!("cannot read `{}`: {err}", self.file.display()))
        })?;
        Ok(MemoryStream::read_only(bytes))
    }

    /// Moves the file to `target`.
    ///
    /// Fails with [`Error::Runtime`] when the upload itself failed or the file
    /// was already moved, and with [`Error::Stream`] when the filesystem
    /// refuses the move. A rename across filesystems falls back to copy and
    /// delete.
    pub fn move_to<P: AsRef<Path>>(&mut self, target: P) -> Result<()> {
        let target = target.as_ref();

        if self.error != UploadError::Ok {
            return Err(Error::Runtime(format!(
                "cannot move a failed upload (error code {})",
                self.error.code()
            )));
        }
        if self.moved {
            return Err(Error::Runtime(format!(
                "uploaded file `{}` has already been moved",
                self.file.display()
            )));
        }

        let describe = |err: io::Error| {
            Error::stream(format!(
                "cannot move `{}` to `{}`: {err}",
                self.file.display(),
                target.display()
            ))
        };

        if fs::rename(&self.file, target).is_err() {
            fs::copy(&self.file, target).map_err(describe)?;
            fs::remove_file(&self.file).map_err(describe)?;
        }

        tracing::debug!(from = %self.file.display(), to = %target.display(), "moved uploaded file");
        self.file = target.to_path_buf();
        self.moved = true;
        Ok(())
    }
}

/// A node of the uploaded-file tree: a file, or a group of fields named like
/// `docs[]` or `user[avatar]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadedFileTree {
    File(UploadedFile),
    Branch(UploadedFiles),
}

impl UploadedFileTree {
    #[inline]
    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            Self::File(file) => Some(file),
            Self::Branch(_) => None,
        }
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&UploadedFileTree> {
        match self {
            Self::File(_) => None,
            Self::Branch(branch) => branch.get(key),
        }
    }
}

/// Form field name → uploaded file(s), in submission order.
pub type UploadedFiles = IndexMap<String, UploadedFileTree>;

/// Normalizes upload metadata into an [`UploadedFiles`] tree.
///
/// Two layouts are accepted and may be mixed: a record per file
/// (`{"avatar": {"tmp_name": ..., "name": ..., ...}}`) and the column layout
/// servers produce for array fields, where every metadata key holds a nested
/// list (`{"docs": {"tmp_name": ["/a", "/b"], "name": ["a", "b"], ...}}`).
/// Records with an unknown error code are skipped.
///
/// # Examples
/// ```
/// use maker_http::parse_uploaded_files;
/// use serde_json::json;
///
/// let files = parse_uploaded_files(&json!({
///     "docs": {
///         "tmp_name": ["/tmp/a", "/tmp/b"],
///         "name": ["a.txt", "b.txt"],
///         "type": ["text/plain", "text/plain"],
///         "size": [3, 4],
///         "error": [0, 0],
///     }
/// }));
///
/// let second = files["docs"].get("1").and_then(|node| node.as_file()).unwrap();
/// assert_eq!(second.client_filename(), Some("b.txt"));
/// assert_eq!(second.size(), Some(4));
/// ```
pub fn parse_uploaded_files(metadata: &Value) -> UploadedFiles {
    let Value::Object(fields) = metadata else {
        return UploadedFiles::new();
    };

    fields
        .iter()
        .filter_map(|(name, field)| Some((name.clone(), parse_field(field)?)))
        .collect()
}

fn parse_field(field: &Value) -> Option<UploadedFileTree> {
    let record = field.as_object()?;

    match record.get("tmp_name") {
        None => Some(UploadedFileTree::Branch(parse_uploaded_files(field))),
        Some(tmp @ (Value::Array(_) | Value::Object(_))) => {
            let mut branch = UploadedFiles::new();

            for key in child_keys(tmp) {
                let sub: Map<String, Value> = ["tmp_name", "name", "type", "size", "error"]
                    .into_iter()
                    .filter_map(|column| {
                        let value = child(record.get(column)?, &key)?;
                        Some((column.to_owned(), value.clone()))
                    })
                    .collect();

                if let Some(node) = parse_field(&Value::Object(sub)) {
                    branch.insert(key, node);
                }
            }

            Some(UploadedFileTree::Branch(branch))
        }
        Some(_) => match UploadedFile::from_metadata(record) {
            Ok(file) => Some(UploadedFileTree::File(file)),
            Err(err) => {
                tracing::warn!(%err, "skipping uploaded file record");
                None
            }
        },
    }
}

fn child_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Array(list) => (0..list.len()).map(|index| index.to_string()).collect(),
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

fn child<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Array(list) => list.get(key.parse::<usize>().ok()?),
        Value::Object(map) => map.get(key),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn temp_upload(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.tmp");
        fs::File::create(&path)
            .unwrap()
            .write_all(contents.as_bytes())
            .unwrap();
        (dir, path)
    }

    #[test]
    fn error_codes() {
        for code in [0, 1, 2, 3, 4, 6, 7, 8] {
            assert_eq!(UploadError::from_code(code).unwrap().code() as u64, code);
        }
        assert!(UploadError::from_code(5).is_err());
        assert!(UploadError::from_code(9).is_err());
    }

    #[test]
    fn stream_and_move() {
        use crate::Stream;

        let (dir, path) = temp_upload("file body");
        let mut file = UploadedFile::new(&path, Some(9), UploadError::Ok, Some("a.txt".into()), None);

        let mut stream = file.stream().unwrap();
        assert_eq!(stream.contents().unwrap(), b"file body");
        assert!(!stream.is_writable());

        let target = dir.path().join("moved.txt");
        file.move_to(&target).unwrap();
        assert!(file.is_moved());
        assert!(!path.exists());
        assert_eq!(fs::read_to_string(&target).unwrap(), "file body");

        assert!(matches!(file.move_to(dir.path().join("again.txt")), Err(Error::Runtime(_))));
        assert!(matches!(file.stream(), Err(Error::Runtime(_))));
    }

    #[test]
    fn move_failures() {
        let (dir, path) = temp_upload("x");

        let mut failed = UploadedFile::new(&path, None, UploadError::Partial, None, None);
        assert!(matches!(failed.move_to(dir.path().join("t")), Err(Error::Runtime(_))));

        let mut missing = UploadedFile::new(dir.path().join("gone"), None, UploadError::Ok, None, None);
        assert!(matches!(missing.move_to(dir.path().join("t")), Err(Error::Stream(_))));
        assert!(!missing.is_moved());
        assert!(matches!(missing.stream(), Err(Error::Stream(_))));
    }

    #[test]
    fn metadata_layouts() {
        let files = parse_uploaded_files(&json!({
            "avatar": {
                "tmp_name": "/tmp/php1",
                "name": "me.png",
                "type": "image/png",
                "size": "120",
                "error": 0,
            },
            "user": {
                "photos": {
                    "tmp_name": {"front": "/tmp/php2", "back": "/tmp/php3"},
                    "name": {"front": "f.jpg", "back": "b.jpg"},
                    "error": {"front": 0, "back": 4},
                }
            },
            "broken": {"tmp_name": "/tmp/php4", "error": 5},
            "ignored": "not a record",
        }));

        let avatar = files["avatar"].as_file().unwrap();
        assert_eq!(avatar.path(), Path::new("/tmp/php1"));
        assert_eq!(avatar.size(), Some(120));
        assert_eq!(avatar.client_media_type(), Some("image/png"));

        let photos = files["user"].get("photos").unwrap();
        let back = photos.get("back").and_then(UploadedFileTree::as_file).unwrap();
        assert_eq!(back.client_filename(), Some("b.jpg"));
        assert_eq!(back.error(), UploadError::NoFile);
        assert_eq!(back.size(), None);

        assert!(!files.contains_key("broken"));
        assert!(!files.contains_key("ignored"));
        assert!(parse_uploaded_files(&json!(null)).is_empty());
    }
}
