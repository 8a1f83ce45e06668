// Ingest collaborators: document decoding and side-car metadata lookup.
// The extraction and scoring core only ever sees decoded text.

pub mod documents;
pub mod metadata;
