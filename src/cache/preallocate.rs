// Copyright (c) 2026 mediacache contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;

/// Reserves `size` bytes for `file` on the filesystem before any writes
/// happen, so later positional writes never grow the file and concurrent
/// reads never see a short file. Falls back to truncation when the
/// filesystem doesn't support range reservation (e.g. tmpfs on some
/// kernels reports `EOPNOTSUPP`).
pub fn preallocate(file: &File, size: i64) -> io::Result<()> {
    if size <= 0 {
        return Ok(());
    }

    let ret = unsafe { libc::fallocate(file.as_raw_fd(), 0, 0, size) };
    if ret == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EOPNOTSUPP) {
        file.set_len(size as u64)
    } else {
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;

    #[test]
    fn preallocates_to_exact_size() {
        let sizes: &[i64] = &[
            0,
            1,
            2,
            3,
            4,
            32,
            64,
            128,
            512,
            1024,
            32 * 1024,
            512 * 1024,
            1024 * 1024,
            32 * 1024 * 1024 + 3,
        ];

        let dir = tempfile::tempdir().expect("tempdir");

        for (n, &size) in sizes.iter().enumerate() {
            let path = dir.path().join(format!("test-file-{n}"));
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&path)
                .expect("create");

            preallocate(&file, size).expect("preallocate");

            let metadata = file.metadata().expect("metadata");
            assert_eq!(metadata.len(), size as u64, "size mismatch for test {n}");
        }
    }

    #[test]
    fn zero_size_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("zero");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .expect("create");
        preallocate(&file, 0).expect("preallocate");
        assert_eq!(file.metadata().unwrap().len(), 0);
    }
}
