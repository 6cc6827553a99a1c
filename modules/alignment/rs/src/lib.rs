pub use alignment::{Alignment, Mapping};
pub use edit::Edit;
pub use op::Op;
pub use position::Position;

mod alignment;
mod edit;
mod op;
mod position;
