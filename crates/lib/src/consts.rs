//! Process-wide constants.

use std::time::Duration;

/// Environment variable overriding the agent base directory.
pub const BASE_DIR_ENV: &str = "STEWARD_BASE_DIR";

/// Collection name for job bundles.
pub const JOBS_COLLECTION: &str = "jobs";

/// Collection name for package bundles.
pub const PACKAGES_COLLECTION: &str = "packages";

/// Suffix of the sibling directory an archive is unpacked into before being
/// renamed over its final location.
pub const UNPACK_SUFFIX: &str = "-bosh-agent-unpack";

/// Name of the build script inside a package source tree.
pub const PACKAGING_SCRIPT: &str = "packaging";

/// Name of a job's primary monit file.
pub const MONIT_FILE: &str = "monit";

/// Extension of a job's additional monit files.
pub const MONIT_EXTENSION: &str = ".monit";

pub const DEFAULT_OWNER_USER: &str = "root";
pub const DEFAULT_OWNER_GROUP: &str = "vcap";

pub const PACKAGE_FILE_MODE: u32 = 0o755;
pub const JOB_FILE_MODE: u32 = 0o750;
pub const JOB_BIN_FILE_MODE: u32 = 0o750;
pub const JOB_OTHER_FILE_MODE: u32 = 0o640;
pub const JOB_WORK_DIR_MODE: u32 = 0o770;

/// Mode of the shared download scratch directory.
pub const TMP_DIR_MODE: u32 = 0o755;

/// Poll interval when retrying removals/renames on platforms that hold file
/// handles after a process exits.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on the retry window for the same operations.
pub const RETRY_TIMEOUT: Duration = Duration::from_secs(120);
