//! Shared helpers for integration tests: synthetic archives and DEX
//! containers.

use std::io::Write;

use tempfile::NamedTempFile;

mod dexbuild {
    include!(concat!(env!("CARGO_MANIFEST_DIR"), "/src/dex/testbuild.rs"));
}

pub(crate) use dexbuild::build_dex;

/// Build a zip archive with the given entries, deflate-compressed.
pub fn build_apk(entries: &[(&str, &[u8])]) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("create temp archive");
    {
        let mut zw = zip::ZipWriter::new(tmp.as_file_mut());
        for (name, data) in entries {
            let opts = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            zw.start_file(name.to_string(), opts).expect("start entry");
            zw.write_all(data).expect("write entry");
        }
        zw.finish().expect("finish archive");
    }
    tmp.flush().expect("flush archive");
    tmp
}
