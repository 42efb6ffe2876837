use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, LoadResult};

pub const WORKER__BEFORE_SINK_APPLY: &str = "worker.before_sink_apply";
pub const PIPELINE__BEFORE_ENQUEUE: &str = "pipeline.before_enqueue";

pub fn load_fail_point(name: &str) -> LoadResult<()> {
    fail_point!(name, |parameter| {
        let mut error_kind = ErrorKind::InjectedFailure;
        if let Some(parameter) = parameter {
            error_kind = match parameter.as_str() {
                "query" => ErrorKind::SinkQueryFailed,
                "timeout" => ErrorKind::SinkTimeout,
                "connection" => ErrorKind::SinkConnectionFailed,
                _ => ErrorKind::InjectedFailure,
            }
        }

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
