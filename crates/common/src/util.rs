//! Assorted utility functions shared across the dotmatrix codebase.

use std::{
    fs::File,
    io::{Read, Write},
};

use crate::error::Error;

/// Reads the contents of the file at the given path into
/// a vector of bytes.
pub fn read_file(path: &str) -> Result<Vec<u8>, Error> {
    let mut file =
        File::open(path).map_err(|_| Error::Io(format!("Failed to open file: {path}")))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .map_err(|_| Error::Io(format!("Failed to read from file: {path}")))?;
    Ok(data)
}

/// Writes the given data to the file at the given path.
pub fn write_file(path: &str, data: &[u8]) -> Result<(), Error> {
    let mut file =
        File::create(path).map_err(|_| Error::Io(format!("Failed to create file: {path}")))?;
    file.write_all(data)
        .map_err(|_| Error::Io(format!("Failed to write to file: {path}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{env::temp_dir, fs::remove_file};

    use super::{read_file, write_file};

    #[test]
    fn test_file_round_trip() {
        let path = temp_dir().join("dotmatrix_util_test.bin");
        let path = path.to_str().unwrap();
        write_file(path, &[0x01, 0x02, 0x03]).unwrap();
        let data = read_file(path).unwrap();
        assert_eq!(data, vec![0x01, 0x02, 0x03]);
        remove_file(path).unwrap();
    }

    #[test]
    fn test_read_missing_file() {
        use crate::error::Error;

        let result = read_file("/path/that/does/not/exist.bin");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
