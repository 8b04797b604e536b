pub mod dry_run;
pub mod environments;
pub mod plan;
pub mod render;
pub mod validate;
