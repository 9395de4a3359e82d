//! Archive-qualified path rewriting
//!
//! Hosts address files inside archives with paths such as
//! `unpack://zip|23|file://C:\music\pack.zip|bgm/track01.adx`: a scheme, a
//! container locator, and after the last `|` the member path. Decoders that
//! look for companion files (same base name, other extension, or a file in
//! the same folder) would see `pack.zip|bgm/track01.adx` as the base name and
//! fail. The rewriter therefore exposes a logical name with the archive
//! segment removed:
//!
//! ```text
//! unpack://zip|23|file://C:\music\pack.zip|bgm/track01.adx
//! -> unpack://zip|23|file://C:\music\bgm/track01.adx
//! ```
//!
//! and maps companion names built from it back into the archive:
//!
//! ```text
//! unpack://zip|23|file://C:\music\bgm/track01.txth
//! -> unpack://zip|23|file://C:\music\pack.zip|bgm/track01.txth
//! ```

const SCHEME_SEPARATOR: &str = "://";
const MEMBER_SEPARATOR: char = '|';

fn is_dir_separator(c: char) -> bool {
    c == '\\' || c == '/'
}

/// Offsets describing an archive-qualified path.
///
/// Derived once when the stream is opened and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePath {
    full: String,
    /// End of `<scheme>://`
    scheme_end: usize,
    /// End of the directory prefix (just past the last separator before the archive name)
    archive_path_end: usize,
    /// End of the container prefix (just past the last `|`)
    archive_file_end: usize,
}

impl ArchivePath {
    /// Parse `path` as an archive member path.
    ///
    /// Returns `None` when the path is not archive-qualified or when the
    /// offsets are not usable (no member part, no directory separator before
    /// the archive name, misordered offsets). Such paths are handled as plain
    /// paths. When `scheme` is given, only paths starting with it qualify.
    pub fn parse(path: &str, scheme: Option<&str>) -> Option<Self> {
        if let Some(scheme) = scheme {
            if !path.starts_with(scheme) {
                return None;
            }
        }

        let scheme_end = path.find(SCHEME_SEPARATOR)? + SCHEME_SEPARATOR.len();
        let pipe = path.rfind(MEMBER_SEPARATOR)?;
        if pipe < scheme_end {
            return None;
        }
        let archive_file_end = pipe + 1;

        let archive_path_end = path[scheme_end..pipe].rfind(is_dir_separator)? + scheme_end + 1;

        if archive_path_end > archive_file_end || archive_file_end >= path.len() {
            return None;
        }

        Some(Self {
            full: path.to_string(),
            scheme_end,
            archive_path_end,
            archive_file_end,
        })
    }

    /// The original archive-qualified path
    pub fn full_path(&self) -> &str {
        &self.full
    }

    /// Offset just past the directory that holds the archive
    pub fn archive_path_end(&self) -> usize {
        self.archive_path_end
    }

    /// Offset just past the last member separator
    pub fn archive_file_end(&self) -> usize {
        self.archive_file_end
    }

    /// Member path inside the archive, as written in the original path
    pub fn member(&self) -> &str {
        &self.full[self.archive_file_end..]
    }

    /// Logical name with the archive segment stripped.
    ///
    /// Sub-folders inside the archive always use `/`.
    pub fn logical_name(&self) -> String {
        let mut name = String::with_capacity(self.full.len());
        name.push_str(&self.full[..self.archive_path_end]);
        name.push_str(&normalize_member(self.member()));
        name
    }

    /// Map a companion path derived from [`logical_name`](Self::logical_name)
    /// back into the archive.
    ///
    /// Returns `None` when no member part can be recovered from `related`, in
    /// which case the caller opens `related` as a plain path.
    pub fn companion_path(&self, related: &str) -> Option<String> {
        let scheme = &self.full[..self.scheme_end];

        let member = if related.len() > self.archive_path_end
            && related.starts_with(scheme)
            && related.is_char_boundary(self.archive_path_end)
        {
            &related[self.archive_path_end..]
        } else {
            match related.rfind(is_dir_separator) {
                Some(pos) => &related[pos + 1..],
                None => related,
            }
        };

        if member.is_empty() {
            return None;
        }

        let mut path = String::with_capacity(self.archive_file_end + member.len());
        path.push_str(&self.full[..self.archive_file_end]);
        path.push_str(&normalize_member(member));
        Some(path)
    }
}

fn normalize_member(member: &str) -> String {
    member.replace('\\', "/")
}
