pub mod cluster;
pub mod flashcopy;
pub mod host;
pub mod misc;
pub mod pool;
pub mod replication;
pub mod vdisk;
pub mod volume;

pub use cluster::*;
pub use flashcopy::*;
pub use host::*;
pub use misc::*;
pub use pool::*;
pub use replication::*;
pub use vdisk::*;
pub use volume::*;

pub use crate::{cli_impl_string_id, cli_impl_string_id_inner, cli_impl_string_uuid};
