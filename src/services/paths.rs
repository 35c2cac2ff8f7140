//! Naming rules shared by albums and images.
//!
//! - Album storage paths are `"{email}-{name}"`, URI-escaped, which makes them
//!   globally unique even though names only need to be unique per user.
//! - Uploaded files are renamed to `"{stem}-{user_id}_{stamp}{ext}"` so that
//!   re-uploading the same filename never overwrites an earlier file.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::sync::atomic::{AtomicI64, Ordering};

/// Joins the owner's email and the album name inside an album path.
pub const ALBUM_PATH_SEPARATOR: char = '-';

/// Top-level storage directory holding one subdirectory per album.
pub const ALBUMS_ROOT: &str = "albums";

pub const MAX_NAME_LEN: usize = 1024;

/// Characters left untouched when escaping a URI path (alphanumerics are always kept).
const URI_PATH_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'+')
    .remove(b'$')
    .remove(b',')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Derive the storage path of an album from its owner's email and its name.
///
/// The name is not re-validated here; callers run [`validate_album_name`] first.
pub fn derive_album_path(email: &str, album_name: &str) -> String {
    let raw = format!("{}{}{}", email, ALBUM_PATH_SEPARATOR, album_name);
    utf8_percent_encode(&raw, URI_PATH_SAFE).to_string()
}

/// Return the album segment of a storage path: everything after the first hyphen.
///
/// The result is still escaped (`foo%20boo`). An email containing a hyphen
/// makes this split land in the wrong place.
pub fn recover_display_name(path: &str) -> &str {
    path.split_once(ALBUM_PATH_SEPARATOR)
        .map(|(_, name)| name)
        .unwrap_or(path)
}

/// Storage prefix of an album directory.
pub fn album_storage_dir(album_path: &str) -> String {
    format!("{}/{}", ALBUMS_ROOT, album_path)
}

/// Check an album name before it is used to derive a path.
pub fn validate_album_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("This field may not be blank.".into());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!(
            "Ensure this field has no more than {} characters.",
            MAX_NAME_LEN
        ));
    }
    if name.contains('/') {
        return Err("Album name can't contain '/' character".into());
    }
    Ok(())
}

/// Names derived for one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadName {
    /// Collision-avoiding filename written to storage.
    pub stored: String,
    /// Capitalized original stem shown to users.
    pub display: String,
}

/// Build the stored and display names of an uploaded file.
///
/// Any directory part the client sent is dropped first.
pub fn upload_name(original: &str, user_id: i64, stamp_ms: i64) -> UploadName {
    let base = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let (stem, extension) = split_extension(base);
    UploadName {
        stored: format!("{}-{}_{}{}", stem, user_id, stamp_ms, extension),
        display: capitalize(stem),
    }
}

/// Split `name` into stem and extension at the last dot.
///
/// Leading dots belong to the stem, so `.bashrc` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Title-case the first character and lowercase the rest.
///
/// A first character whose uppercase form is several characters (`ß` -> `SS`)
/// keeps only the leading one in upper case, so `ßig` becomes `Ssig`.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut upper = first.to_uppercase();
    let mut out = String::with_capacity(value.len());
    out.extend(upper.next());
    out.extend(upper.flat_map(char::to_lowercase));
    out.extend(chars.flat_map(char::to_lowercase));
    out
}

/// Millisecond clock that never hands out the same value twice.
///
/// Two uploads landing in the same wall-clock millisecond get consecutive
/// stamps instead of identical filenames.
#[derive(Debug, Default)]
pub struct UploadClock {
    last: AtomicI64,
}

impl UploadClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_stamp(&self) -> i64 {
        self.next_after(chrono::Utc::now().timestamp_millis())
    }

    fn next_after(&self, now_ms: i64) -> i64 {
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now_ms.max(current + 1);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use percent_encoding::percent_decode_str;

    const ALICE: &str = "alice@example.com";
    const BOB: &str = "bob@example.com";

    #[test]
    fn escapes_spaces_and_keeps_hyphen() {
        assert_eq!(
            derive_album_path(ALICE, "foo boo"),
            "alice@example.com-foo%20boo"
        );
        assert_eq!(derive_album_path(ALICE, "x-y"), "alice@example.com-x-y");
    }

    #[test]
    fn escapes_non_ascii_as_utf8() {
        assert_eq!(derive_album_path(ALICE, "café"), "alice@example.com-caf%C3%A9");
        assert_eq!(derive_album_path(ALICE, "100%"), "alice@example.com-100%25");
    }

    #[test]
    fn distinct_names_give_distinct_paths() {
        let names = ["foo", "foo ", "foo%20", "Foo", "foo boo", "foo-boo", "é", "%C3%A9"];
        let mut paths: Vec<String> = names.iter().map(|n| derive_album_path(ALICE, n)).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), names.len());
    }

    #[test]
    fn same_name_for_different_users_gives_distinct_paths() {
        assert_ne!(derive_album_path(ALICE, "holiday"), derive_album_path(BOB, "holiday"));
    }

    #[test]
    fn recovers_plain_names() {
        for name in ["foo", "holiday-2024", "a.b_c"] {
            assert_eq!(recover_display_name(&derive_album_path(ALICE, name)), name);
        }
    }

    #[test]
    fn recovered_segment_decodes_to_the_name() {
        let path = derive_album_path(ALICE, "foo boo");
        let segment = recover_display_name(&path);
        assert_eq!(segment, "foo%20boo");
        assert_eq!(percent_decode_str(segment).decode_utf8().unwrap(), "foo boo");
    }

    #[test]
    fn hyphenated_email_breaks_recovery() {
        let path = derive_album_path("first-last@example.com", "trip");
        assert_eq!(recover_display_name(&path), "last@example.com-trip");
    }

    #[test]
    fn rejects_slash_in_album_name() {
        assert_eq!(
            validate_album_name("foo////").unwrap_err(),
            "Album name can't contain '/' character"
        );
        assert!(validate_album_name("").is_err());
        assert!(validate_album_name(&"a".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(validate_album_name("foo boo").is_ok());
    }

    #[test]
    fn upload_name_inserts_user_and_stamp() {
        let name = upload_name("test.png", 7, 1_700_000_000_123);
        assert_eq!(name.stored, "test-7_1700000000123.png");
        assert_eq!(name.display, "Test");
    }

    #[test]
    fn upload_name_handles_odd_filenames() {
        assert_eq!(upload_name("archive.tar.gz", 1, 5).stored, "archive.tar-1_5.gz");
        assert_eq!(upload_name(".hidden", 1, 5).stored, ".hidden-1_5");
        assert_eq!(upload_name("../../etc/passwd", 1, 5).stored, "passwd-1_5");
        assert_eq!(upload_name("C:\\photos\\SUNSET.JPG", 1, 5).display, "Sunset");
    }

    #[test]
    fn capitalize_lowercases_the_tail() {
        assert_eq!(capitalize("hELLO wORLD"), "Hello world");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("ßig"), "Ssig");
        assert_eq!(capitalize("élan"), "Élan");
    }

    #[test]
    fn clock_is_strictly_increasing_within_one_millisecond() {
        let clock = UploadClock::new();
        let a = clock.next_after(1_000);
        let b = clock.next_after(1_000);
        let c = clock.next_after(999);
        assert_eq!((a, b, c), (1_000, 1_001, 1_002));
        assert_eq!(clock.next_after(5_000), 5_000);
    }
}
