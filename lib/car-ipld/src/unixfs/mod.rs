mod proto;

use std::io;

pub use proto::unixfs::mod_Data::DataType;
pub use proto::unixfs::Data;

impl<'a> TryFrom<&'a [u8]> for Data<'a> {
    type Error = io::Error;

    fn try_from(data: &'a [u8]) -> Result<Self, Self::Error> {
        use quick_protobuf::{BytesReader, MessageRead};
        Data::from_reader(&mut BytesReader::from_bytes(data), data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl Data<'_> {
    /// Serialize the message into protobuf bytes, without a length prefix.
    pub fn to_bytes(&self) -> quick_protobuf::Result<Vec<u8>> {
        use quick_protobuf::{MessageWrite, Writer};
        let mut out = Vec::with_capacity(self.get_size());
        self.write_message(&mut Writer::new(&mut out))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[test]
    fn test_decode_directory_marker() {
        // The canonical UnixFS directory payload.
        let data = Data::try_from([8u8, 1].as_slice()).unwrap();
        assert_eq!(data.Type, DataType::Directory);
        assert!(data.Data.is_none());

        let directory = Data {
            Type: DataType::Directory,
            ..Default::default()
        };
        assert_eq!(directory.to_bytes().unwrap(), vec![8, 1]);
    }

    #[test]
    fn test_file_with_blocksizes() {
        let file = Data {
            Type: DataType::File,
            Data: Some(Cow::Borrowed(&b"hello"[..])),
            filesize: Some(5),
            blocksizes: vec![2, 3],
            ..Default::default()
        };
        let bytes = file.to_bytes().unwrap();
        // Type, Data, filesize, then one field per blocksize.
        assert_eq!(
            bytes,
            vec![8, 2, 18, 5, b'h', b'e', b'l', b'l', b'o', 24, 5, 32, 2, 32, 3]
        );
        let decoded = Data::try_from(bytes.as_slice()).unwrap();
        assert_eq!(decoded, file);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(Data::try_from([0xffu8, 0xff, 0xff].as_slice()).is_err());
    }
}
