use std::{
    fmt::{self, Formatter},
    sync::Arc,
};

use crate::Pool;

mod fan_out;
mod manager;
mod mutex;
mod operations;


pub use manager::*;
pub use mutex::*;

#[inline]
fn fmt_nodes(nodes: &Arc<[Arc<dyn Pool>]>, f: &mut Formatter<'_>) -> fmt::Result {
    f.write_fmt(format_args!("[{} node(s)]", nodes.len()))
}
