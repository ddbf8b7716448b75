//! The abstract representation of one remote file belonging to a dataset
//! (spec §3, "FileDescriptor").

use serde::{Deserialize, Serialize};

/// One remote file an adapter has enumerated, without having fetched it.
///
/// `name` must be unique within a dataset. Descriptors that share a
/// `group_key` (e.g. the `.shp`/`.shx`/`.dbf`/`.prj` components of a
/// shapefile) must be selected and downloaded together — the budget
/// selector treats them as one atomic unit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FileDescriptor {
    /// Path relative to the dataset root.
    pub name: String,
    /// Absolute fetch URL.
    pub url: String,
    /// Declared size in bytes, if the provider told us. `None` means
    /// unknown, which the size budget selector treats conservatively (see
    /// [`crate::budget`]).
    pub declared_size: Option<u64>,
    /// A MIME type hint, if the provider supplied one.
    pub mime_hint: Option<String>,
    /// A checksum hint (e.g. `"md5:deadbeef..."`), if the provider supplied
    /// one. Not currently verified post-download — no decoder in this crate
    /// needs it yet — but carried through so a caller-supplied decoder can
    /// check it.
    pub checksum_hint: Option<String>,
    /// Siblings that must be selected and downloaded as a single unit share
    /// the same `group_key`.
    pub group_key: Option<String>,
    /// Set by an adapter when the provider marked this file restricted or
    /// embargoed. Such files must never enter a selection set; see
    /// [`FileDescriptor::is_selectable`].
    pub restricted: bool,
}

impl FileDescriptor {
    /// Construct a descriptor for an openly-accessible file.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> FileDescriptor {
        FileDescriptor {
            name: name.into(),
            url: url.into(),
            declared_size: None,
            mime_hint: None,
            checksum_hint: None,
            group_key: None,
            restricted: false,
        }
    }

    /// Builder: set the declared size.
    pub fn with_declared_size(mut self, size: u64) -> FileDescriptor {
        self.declared_size = Some(size);
        self
    }

    /// Builder: set the group key.
    pub fn with_group_key(mut self, key: impl Into<String>) -> FileDescriptor {
        self.group_key = Some(key.into());
        self
    }

    /// Builder: mark this descriptor restricted/embargoed.
    pub fn restricted(mut self) -> FileDescriptor {
        self.restricted = true;
        self
    }

    /// Restricted/embargoed descriptors are never selectable (spec §4.6:
    /// "Restricted/embargoed files must be tagged and excluded from the
    /// selection set, with a user-visible warning.").
    pub fn is_selectable(&self) -> bool {
        !self.restricted
    }

    /// The file extension, lowercased, without the leading dot. Empty if
    /// there isn't one.
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

/// Extensions the geospatial-only filter (spec §4.3 step 1) treats as
/// geospatial by default. Callers can extend this set via
/// [`crate::config::RunConfig::extra_geospatial_extensions`].
pub const DEFAULT_GEOSPATIAL_EXTENSIONS: &[&str] = &[
    "shp", "shx", "dbf", "prj", "cpg", "gpkg", "geojson", "json", "kml", "kmz", "gml",
    "tif", "tiff", "nc", "netcdf", "asc", "las", "laz", "csv", "zip",
];
