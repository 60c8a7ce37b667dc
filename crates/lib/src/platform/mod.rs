//! Host platform seams: filesystem, clock, retry policy and directory layout.

pub mod clock;
pub mod fs;
pub mod os;
pub mod paths;
pub mod retry;

pub use clock::{Clock, SystemClock};
pub use fs::{FileSystem, OsFileSystem, Ownership};
pub use os::Os;
pub use paths::DirProvider;
pub use retry::RetryPolicy;
