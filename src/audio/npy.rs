//! Feature array persistence in NumPy `.npy` format
//!
//! Only what the feature files need: little-endian float32, C order,
//! two dimensions.

use crate::{Error, Result};
use ndarray::Array2;
use std::io::Write;
use std::path::Path;

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const HEADER_ALIGN: usize = 64;

/// Encode a 2-D float32 array as `.npy` (format version 1.0)
pub fn encode_npy(array: &Array2<f32>) -> Vec<u8> {
    let (rows, cols) = array.dim();
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows, cols
    );
    // magic(6) + version(2) + header_len(2) + header + '\n' is padded to 64 bytes
    let unpadded = NPY_MAGIC.len() + 4 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(unpadded + padding + rows * cols * 4);
    out.extend_from_slice(NPY_MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    // iter() walks in logical (row-major) order regardless of memory layout
    for &v in array.iter() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Decode a 2-D float32 `.npy` buffer
pub fn decode_npy(data: &[u8]) -> Result<Array2<f32>> {
    if data.len() < 10 || &data[..6] != NPY_MAGIC {
        return Err(Error::InvalidFormat("missing NPY magic".into()));
    }

    let (header_start, header_len) = match data[6] {
        1 => (10, u16::from_le_bytes([data[8], data[9]]) as usize),
        2 | 3 => {
            if data.len() < 12 {
                return Err(Error::InvalidFormat("truncated NPY header".into()));
            }
            (
                12,
                u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize,
            )
        }
        v => return Err(Error::InvalidFormat(format!("unsupported NPY version {}", v))),
    };
    let header_end = header_start + header_len;
    if data.len() < header_end {
        return Err(Error::InvalidFormat("truncated NPY header".into()));
    }

    let header = String::from_utf8_lossy(&data[header_start..header_end]);
    if !header.contains("'descr': '<f4'") {
        return Err(Error::InvalidFormat(format!(
            "expected little-endian float32, header: {}",
            header.trim()
        )));
    }
    if header.contains("'fortran_order': True") {
        return Err(Error::InvalidFormat("Fortran-ordered arrays are not supported".into()));
    }

    let shape = parse_shape(&header)?;
    if shape.len() != 2 {
        return Err(Error::ShapeMismatch {
            expected: "2-D array".into(),
            actual: format!("{}-D array {:?}", shape.len(), shape),
        });
    }

    let body = &data[header_end..];
    let expected = shape[0]
        .checked_mul(shape[1])
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| {
            Error::InvalidFormat(format!("NPY shape {:?} is too large", shape))
        })?;
    if body.len() != expected {
        return Err(Error::InvalidFormat(format!(
            "NPY body has {} bytes, shape {:?} needs {}",
            body.len(),
            shape,
            expected
        )));
    }

    let values: Vec<f32> = body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(Array2::from_shape_vec((shape[0], shape[1]), values)?)
}

fn parse_shape(header: &str) -> Result<Vec<usize>> {
    let start = header
        .find("'shape':")
        .ok_or_else(|| Error::InvalidFormat("NPY header has no shape".into()))?;
    let rest = &header[start + 8..];
    let (open, close) = match (rest.find('('), rest.find(')')) {
        (Some(open), Some(close)) if open < close => (open, close),
        _ => return Err(Error::InvalidFormat("malformed NPY shape".into())),
    };

    rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| Error::InvalidFormat(format!("bad NPY dimension '{}'", s)))
        })
        .collect()
}

/// Write a 2-D float32 array to a `.npy` file
pub fn write_npy<P: AsRef<Path>>(path: P, array: &Array2<f32>) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(&encode_npy(array))?;
    Ok(())
}

/// Read a 2-D float32 array from a `.npy` file
pub fn read_npy<P: AsRef<Path>>(path: P) -> Result<Array2<f32>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::FileNotFound(path.display().to_string()));
    }
    decode_npy(&std::fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_header_layout() {
        let bytes = encode_npy(&Array2::zeros((80, 7)));
        assert_eq!(&bytes[..6], NPY_MAGIC);
        assert_eq!(bytes[6], 1);
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);
        assert_eq!(bytes[10 + header_len - 1], b'\n');
        assert_eq!(bytes.len(), 10 + header_len + 80 * 7 * 4);

        let header = std::str::from_utf8(&bytes[10..10 + header_len]).unwrap();
        assert!(header.contains("'shape': (80, 7)"));
    }

    #[test]
    fn test_encode_decode() {
        let a = array![[1.0f32, -2.5, 3.25], [0.0, 1e-6, 42.0]];
        let back = decode_npy(&encode_npy(&a)).unwrap();
        assert_eq!(a, back);
    }

    #[test]
    fn test_transposed_view_written_in_logical_order() {
        let a = array![[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]];
        // Owned copy of a transposed view keeps column-major memory
        let t = a.t().to_owned();
        let back = decode_npy(&encode_npy(&t)).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.dim(), (2, 3));
    }

    #[test]
    fn test_rejects_non_f32() {
        let mut bytes = encode_npy(&Array2::zeros((2, 2)));
        let pos = bytes.windows(3).position(|w| w == b"<f4").unwrap();
        bytes[pos + 2] = b'8';
        assert!(matches!(decode_npy(&bytes), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_rejects_truncated_body() {
        let mut bytes = encode_npy(&Array2::zeros((4, 4)));
        bytes.truncate(bytes.len() - 4);
        assert!(decode_npy(&bytes).is_err());
        assert!(decode_npy(b"not an npy file").is_err());
    }

    #[test]
    fn test_rejects_oversized_shape() {
        let header = "{'descr': '<f4', 'fortran_order': False, 'shape': (9999999999999999, 9999), }\n";
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&[0u8; 16]);

        assert!(matches!(decode_npy(&bytes), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mel.npy");
        let a = Array2::from_shape_fn((5, 9), |(i, j)| (i * 9 + j) as f32 * 0.5);
        write_npy(&path, &a).unwrap();
        assert_eq!(read_npy(&path).unwrap(), a);
    }
}
