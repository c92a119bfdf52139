//! Decomposition of shared-library file names
//!
//! `libQt5Core.so.5.9.3` is the same library as `libQt5Core.so`; the
//! exclusion policy and Qt classification want to reason about the base
//! name while results keep the full name as it appeared in the binary.

/// How a library name is packaged, judged from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryKind {
    /// `.so`, possibly followed by a version suffix.
    SharedObject,
    /// `.dll` (any case).
    Dll,
    Other,
}

/// A shared-library file name split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryName {
    full_name: String,
    base_name: String,
    kind: LibraryKind,
    version_suffix: Option<String>,
}

impl LibraryName {
    pub fn parse(name: &str) -> Self {
        // The extension is the ".so" that ends the name or is followed
        // only by a version suffix, so "libso.so.1" splits at the last
        // candidate.
        for (index, _) in name.rmatch_indices(".so") {
            let after = &name[index + 3..];
            if after.is_empty() || after.starts_with('.') {
                let version = after.strip_prefix('.').map(str::to_owned);
                return Self {
                    full_name: name.to_owned(),
                    base_name: name[..index].to_owned(),
                    kind: LibraryKind::SharedObject,
                    version_suffix: version,
                };
            }
        }

        let lower = name.to_ascii_lowercase();
        if let Some(base_len) = lower.strip_suffix(".dll").map(str::len) {
            return Self {
                full_name: name.to_owned(),
                base_name: name[..base_len].to_owned(),
                kind: LibraryKind::Dll,
                version_suffix: None,
            };
        }

        Self {
            full_name: name.to_owned(),
            base_name: name.to_owned(),
            kind: LibraryKind::Other,
            version_suffix: None,
        }
    }

    /// The name exactly as the binary declared it.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The name with extension and version suffix removed,
    /// e.g. `libQt5Core` for `libQt5Core.so.5.9.3`.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn kind(&self) -> LibraryKind {
        self.kind
    }

    /// Version trailing the extension, e.g. `5.9.3`.
    pub fn version_suffix(&self) -> Option<&str> {
        self.version_suffix.as_deref()
    }

    /// Full name with the version suffix dropped: `libQt5Core.so`.
    pub fn name_without_version(&self) -> String {
        match self.kind {
            LibraryKind::SharedObject => format!("{}.so", self.base_name),
            _ => self.full_name.clone(),
        }
    }
}

/// Whether a library name is a Qt module library
/// (`Qt5Core.dll`, `libQt5Gui.so.5`, `QtConcurrent.dll`, ...).
///
/// Callers use this to select the Qt entries of a result, e.g. to feed
/// a plugin enumerator.
pub fn is_qt_library(name: &str) -> bool {
    let base = LibraryName::parse(name);
    let base = base.base_name();
    let base = base.strip_prefix("lib").unwrap_or(base);

    let Some(rest) = base.strip_prefix("Qt") else {
        return false;
    };
    let module = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    module.starts_with(|c: char| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_versioned_shared_object() {
        let name = LibraryName::parse("libQt5Core.so.5.9.3");
        assert_eq!(name.base_name(), "libQt5Core");
        assert_eq!(name.kind(), LibraryKind::SharedObject);
        assert_eq!(name.version_suffix(), Some("5.9.3"));
        assert_eq!(name.name_without_version(), "libQt5Core.so");
    }

    #[test]
    fn parses_unversioned_shared_object() {
        let name = LibraryName::parse("libc.so.6");
        assert_eq!(name.base_name(), "libc");
        assert_eq!(name.version_suffix(), Some("6"));

        let name = LibraryName::parse("libdemo.so");
        assert_eq!(name.base_name(), "libdemo");
        assert_eq!(name.version_suffix(), None);
    }

    #[test]
    fn parses_dll_names() {
        let name = LibraryName::parse("KERNEL32.dll");
        assert_eq!(name.base_name(), "KERNEL32");
        assert_eq!(name.kind(), LibraryKind::Dll);

        let name = LibraryName::parse("Qt5Core.DLL");
        assert_eq!(name.base_name(), "Qt5Core");
        assert_eq!(name.kind(), LibraryKind::Dll);
    }

    #[test]
    fn odd_names_stay_whole() {
        let name = LibraryName::parse("resolver");
        assert_eq!(name.base_name(), "resolver");
        assert_eq!(name.kind(), LibraryKind::Other);
    }

    #[test]
    fn qt_libraries_are_recognized() {
        assert!(is_qt_library("Qt5Core.dll"));
        assert!(is_qt_library("libQt5Gui.so.5.9.3"));
        assert!(is_qt_library("libQt6Widgets.so"));
        assert!(is_qt_library("QtConcurrent.dll"));

        assert!(!is_qt_library("libc.so.6"));
        assert!(!is_qt_library("Qt.dll"));
        assert!(!is_qt_library("libqtutil.so"));
        assert!(!is_qt_library("KERNEL32.dll"));
    }
}
