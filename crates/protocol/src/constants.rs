use std::time::Duration;

/// Time allowed to establish a TCP/TLS connection to the server.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for a single request/response exchange.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bytes subtracted from the server's `post_max_size` to size upload chunks.
///
/// Leaves room for the other form fields so a chunk request stays under
/// the server's request-body limit.
pub const CHUNK_SAFETY_MARGIN: u64 = 1000;

/// Chunk size for project files sent before a store (and so its
/// `post_max_size`) exists.
pub const INITIAL_CHUNK_SIZE: usize = 64 * 1024;

/// File suffix of a QGIS project definition.
pub const PROJECT_FILE_SUFFIX: &str = ".qgs";

/// Port that selects `https`; any other port means plain `http`.
pub const HTTPS_PORT: u16 = 443;

/// Port assumed when a server profile omits one.
pub const DEFAULT_PORT: u16 = HTTPS_PORT;

/// Fixed server endpoint paths.
pub mod endpoints {
    /// Session login (`submit`, `email`, `pwd`).
    pub const LOGIN: &str = "/admin/action/login.php";

    /// Store manifest, followed by `/{store name}`.
    pub const STORE_INFO: &str = "/rest/store";

    /// All stores visible to the session.
    pub const STORE_LIST: &str = "/rest/stores";

    /// Chunk upload (`action=upload_bytes`).
    pub const UPLOAD: &str = "/admin/action/upload.php";

    /// Store create (`action=save`) and file registration (`action=update_file`).
    pub const STORE_ACTION: &str = "/admin/action/qgs.php";

    /// Access group listing (`action=list`).
    pub const ACCESS_GROUPS: &str = "/admin/action/access_group.php";

    /// Basemap listing (`action=list`).
    pub const BASEMAPS: &str = "/admin/action/basemap.php";

    /// Layer publishing (`action=save`).
    pub const LAYER_ACTION: &str = "/admin/action/qgs_layer.php";
}

/// Form `action` values understood by the admin endpoints.
pub mod actions {
    pub const UPLOAD_BYTES: &str = "upload_bytes";
    pub const UPDATE_FILE: &str = "update_file";
    pub const SAVE: &str = "save";
    pub const LIST: &str = "list";
}
