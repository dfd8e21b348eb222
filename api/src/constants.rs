//! Application constants

/// Maximum request body size for uploads (16 MB)
pub const MAX_UPLOAD_SIZE: usize = 16 * 1024 * 1024;

/// File extensions accepted by /verify
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Multipart field carrying the certificate image
pub const UPLOAD_FIELD: &str = "file";

/// Header carrying the shared secret
pub const API_KEY_HEADER: &str = "x-api-key";

pub const DEFAULT_UPLOAD_FOLDER: &str = "/tmp/uploads";

pub const DEFAULT_API_KEY_FILE: &str = ".api_key";

pub const DEFAULT_PORT: u16 = 5000;
