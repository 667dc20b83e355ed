//! Zero-run-length encoding of visibility rows.
//!
//! Non-zero bytes are copied verbatim. A run of zero bytes becomes a zero
//! followed by the run length, at most 255 per pair.

use crate::error::{CompileError, Result};

/// Encodes one row.
pub fn compress(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(row.len());
    let mut i = 0;
    while i < row.len() {
        if row[i] != 0 {
            out.push(row[i]);
            i += 1;
            continue;
        }
        let mut run = 0u8;
        while i < row.len() && row[i] == 0 && run < u8::MAX {
            run += 1;
            i += 1;
        }
        out.push(0);
        out.push(run);
    }
    out
}

/// Decodes one row of `row_len` bytes from the front of `data`.
pub fn decompress(data: &[u8], row_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(row_len);
    let mut bytes = data.iter();
    while out.len() < row_len {
        let byte = *bytes
            .next()
            .ok_or_else(|| CompileError::InvalidTreeData("visibility row is truncated".into()))?;
        if byte != 0 {
            out.push(byte);
            continue;
        }
        let run = *bytes
            .next()
            .ok_or_else(|| CompileError::InvalidTreeData("visibility run is truncated".into()))?;
        out.resize(out.len() + run as usize, 0);
    }
    if out.len() != row_len {
        return Err(CompileError::InvalidTreeData(
            "visibility run overruns its row".into(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_runs_collapse() {
        assert_eq!(compress(&[0x05, 0, 0, 0, 0x80]), vec![0x05, 0, 3, 0x80]);
        assert_eq!(compress(&[0, 0]), vec![0, 2]);
        assert_eq!(compress(&[]), Vec::<u8>::new());
    }

    #[test]
    fn long_runs_split_at_255() {
        let row = vec![0u8; 300];
        let packed = compress(&row);
        assert_eq!(packed, vec![0, 255, 0, 45]);
        assert_eq!(decompress(&packed, 300).unwrap(), row);
    }

    fn zeros_between(run: usize) -> Vec<u8> {
        let mut row = vec![0x81];
        row.resize(1 + run, 0);
        row.push(0x42);
        row
    }

    #[test]
    fn mixed_rows_survive_compression() {
        let mut rows = vec![
            Vec::new(),
            vec![0, 0, 0, 0x10, 0x20],
            vec![0x10, 0x20, 0, 0, 0],
            vec![0, 0x01, 0, 0, 0x80, 0],
            vec![0xff; 64],
            vec![0xff; 600],
            vec![0; 511],
        ];
        for run in [1, 254, 255, 256, 510, 511] {
            rows.push(zeros_between(run));
        }
        let mut leading = vec![0; 256];
        leading.extend([0x0f, 0xf0]);
        leading.resize(leading.len() + 510, 0);
        rows.push(leading);

        for row in &rows {
            let packed = compress(row);
            assert_eq!(&decompress(&packed, row.len()).unwrap(), row, "row of {} bytes", row.len());
        }
    }

    #[test]
    fn run_boundaries_encode_in_whole_pairs() {
        assert_eq!(compress(&zeros_between(255)), vec![0x81, 0, 255, 0x42]);
        assert_eq!(compress(&zeros_between(256)), vec![0x81, 0, 255, 0, 1, 0x42]);
        assert_eq!(compress(&zeros_between(510)), vec![0x81, 0, 255, 0, 255, 0x42]);
        assert_eq!(compress(&zeros_between(511)), vec![0x81, 0, 255, 0, 255, 0, 1, 0x42]);
    }

    #[test]
    fn rows_concatenate_into_one_stream() {
        let rows = [zeros_between(300), vec![0xff; 3], vec![0; 2]];
        let stream: Vec<u8> = rows.iter().flat_map(|row| compress(row)).collect();
        let mut offset = 0;
        for row in &rows {
            assert_eq!(&decompress(&stream[offset..], row.len()).unwrap(), row);
            offset += compress(row).len();
        }
        assert_eq!(offset, stream.len());
    }

    #[test]
    fn decompress_reads_one_row_from_a_stream() {
        let data = [0x01, 0, 2, 0xff, 0x07];
        assert_eq!(decompress(&data, 3).unwrap(), vec![0x01, 0, 0]);
        assert_eq!(decompress(&data[3..], 2).unwrap(), vec![0xff, 0x07]);
    }

    #[test]
    fn malformed_rows_are_rejected() {
        assert!(decompress(&[0x01], 2).is_err());
        assert!(decompress(&[0], 2).is_err());
        assert!(decompress(&[0, 5], 2).is_err());
    }
}
