// Job service: in-memory registry, HTTP handlers, and the background cleanup task.
// Each job owns `WORK_DIR/<job_id>` and, by default, `OUTPUT_DIR/<job_id>`.

pub mod cleanup;
pub mod handlers;
pub mod registry;
