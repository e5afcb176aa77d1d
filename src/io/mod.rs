mod buf;
mod buf_ext;
mod buf_mut;
mod buf_stream;

pub use buf::Buf;
pub use buf_ext::{BufExt, BufMutExt};
pub use buf_mut::BufMut;
pub use buf_stream::BufStream;
