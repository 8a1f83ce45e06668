// Job-description extraction: normalize → segment → extract fields.
// Pure, synchronous and infallible; every miss resolves to a documented fallback.

pub mod fields;
pub mod normalize;
pub mod sections;

pub use fields::parse_job_description;
