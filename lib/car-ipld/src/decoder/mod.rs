pub mod data_codec;
pub mod fs;
