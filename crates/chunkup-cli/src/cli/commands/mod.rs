//! CLI command handlers, one file per command.

mod cancel;
mod cleanup;
mod completions;
mod drive;
mod finalize;
mod resume;
mod status;
mod upload;

pub use cancel::run_cancel;
pub use cleanup::run_cleanup;
pub use completions::run_completions;
pub use finalize::run_finalize;
pub use resume::run_resume;
pub use status::run_status;
pub use upload::{run_upload, UploadOverrides};
