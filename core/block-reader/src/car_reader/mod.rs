pub mod decoder;
pub mod reader;

pub use decoder::{CarDecoder, Frame, ReaderState};
pub use reader::{BlockReader, BlockStream, ReadHandle};
