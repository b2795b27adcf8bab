use std::collections::BTreeMap;
use std::path::PathBuf;

/// Names of the configuration signals consumed by the resolver.
pub mod keys {
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const DB_HOST: &str = "DB_HOST";
    pub const DB_PORT: &str = "DB_PORT";
    pub const DB_NAME: &str = "DB_NAME";
    pub const DB_USER: &str = "DB_USER";
    pub const DB_PASSWORD: &str = "DB_PASSWORD";

    pub const NETWORK_DB_PATH: &str = "NETWORK_DB_PATH";
    pub const VERCEL_VOLUME_PATH: &str = "VERCEL_VOLUME_PATH";

    pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
    pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
    pub const AWS_REGION: &str = "AWS_REGION";
    pub const S3_BUCKET: &str = "S3_BUCKET";
    pub const S3_KEY: &str = "S3_KEY";
    pub const S3_ENDPOINT: &str = "S3_ENDPOINT";

    pub const GOOGLE_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
    pub const GCS_BUCKET: &str = "GCS_BUCKET";
    pub const GCS_BLOB: &str = "GCS_BLOB";

    pub const BLOB_READ_WRITE_TOKEN: &str = "BLOB_READ_WRITE_TOKEN";
    pub const BLOB_NAME: &str = "BLOB_NAME";
    pub const BLOB_URL: &str = "BLOB_URL";

    pub const DB_PATH: &str = "DB_PATH";

    /// Every key the snapshot captures from the environment.
    pub const ALL: &[&str] = &[
        DATABASE_URL,
        DB_HOST,
        DB_PORT,
        DB_NAME,
        DB_USER,
        DB_PASSWORD,
        NETWORK_DB_PATH,
        VERCEL_VOLUME_PATH,
        AWS_ACCESS_KEY_ID,
        AWS_SECRET_ACCESS_KEY,
        AWS_REGION,
        S3_BUCKET,
        S3_KEY,
        S3_ENDPOINT,
        GOOGLE_APPLICATION_CREDENTIALS,
        GCS_BUCKET,
        GCS_BLOB,
        BLOB_READ_WRITE_TOKEN,
        BLOB_NAME,
        BLOB_URL,
        DB_PATH,
    ];
}

/// Default file name of the embedded database, locally and remotely.
pub const DEFAULT_DB_FILE_NAME: &str = "student_courses.db";

/// Default bucket used by object-storage providers when none is configured.
pub const DEFAULT_BUCKET: &str = "student-course-db";

/// Immutable snapshot of the configuration signals, captured once at startup.
///
/// Blank values are treated as absent. Nothing downstream reads the process
/// environment again; the snapshot is passed explicitly to the resolver.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    vars: BTreeMap<String, String>,
}

impl ConfigSnapshot {
    /// Build a snapshot from an explicit list of key/value pairs.
    ///
    /// Unknown keys are kept; later duplicates override earlier ones.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        Self { vars }
    }

    /// Capture the recognised keys from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(
            keys::ALL
                .iter()
                .filter_map(|key| std::env::var(key).ok().map(|value| (*key, value))),
        )
    }

    /// Look up a signal. Surrounding whitespace is stripped.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|v| v.trim())
    }

    /// Whether the signal is present.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Path of the local working copy: `DB_PATH`, or a file in the temp dir.
    pub fn working_path(&self) -> PathBuf {
        self.get(keys::DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME))
    }

    /// Whether no signal at all was captured.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl std::fmt::Debug for ConfigSnapshot {
    // Values may be secrets; only the keys are printed.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigSnapshot")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .finish()
    }
}
