//! Configuration sources, applied in the order the loader adds them.

pub(super) mod environment;
pub(super) mod explicit_file;
pub(super) mod workspace_file;
