//! Byte-sampling row-count estimator: read the header, sample a handful of
//! data lines, and extrapolate from the remaining file size. Exact if the
//! file's data section is no longer than the sample cap.

use std::io::BufRead;
use std::path::Path;

const SMALL_SAMPLE_CAP: usize = 100;
const LARGE_SAMPLE_CAP: usize = 1000;
/// Files whose header + a small sample don't already exhaust the file get
/// the larger sample cap, under the assumption that a bigger file benefits
/// from a more representative average line length.
const LARGE_FILE_THRESHOLD_BYTES: u64 = 10 * 1024 * 1024;

/// Estimates the number of data rows (excluding the header) in `path`.
/// Returns `0` for a missing file.
pub fn estimate_row_count(path: &Path) -> std::io::Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    let file_size = std::fs::metadata(path)?.len();
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);

    let mut header = String::new();
    let header_bytes = reader.read_line(&mut header)? as u64;
    if header_bytes == 0 {
        return Ok(0);
    }

    let sample_cap = if file_size > LARGE_FILE_THRESHOLD_BYTES {
        LARGE_SAMPLE_CAP
    } else {
        SMALL_SAMPLE_CAP
    };

    let mut sampled_bytes: u64 = 0;
    let mut sampled_lines: u64 = 0;
    let mut line = String::new();
    loop {
        if sampled_lines as usize >= sample_cap {
            break;
        }
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            // EOF within the sample: the exact count is what we read.
            return Ok(sampled_lines);
        }
        sampled_bytes += n as u64;
        sampled_lines += 1;
    }

    let avg_bytes_per_line = sampled_bytes as f64 / sampled_lines as f64;
    let remaining_bytes = file_size.saturating_sub(header_bytes + sampled_bytes);
    let remaining_lines = (remaining_bytes as f64 / avg_bytes_per_line).ceil() as u64;
    Ok(sampled_lines + remaining_lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_lines(n: usize) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "a,b,c").unwrap();
        for i in 0..n {
            writeln!(f, "{i},{i},{i}").unwrap();
        }
        f
    }

    #[test]
    fn exact_for_small_files() {
        let f = write_lines(10);
        assert_eq!(estimate_row_count(f.path()).unwrap(), 10);
    }

    #[test]
    fn within_factor_of_two_for_large_uniform_files() {
        let f = write_lines(5000);
        let estimate = estimate_row_count(f.path()).unwrap();
        assert!(estimate >= 2500 && estimate <= 10000, "estimate={estimate}");
    }

    #[test]
    fn missing_file_is_zero() {
        assert_eq!(estimate_row_count(Path::new("/no/such/file.csv")).unwrap(), 0);
    }
}
