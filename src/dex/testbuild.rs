// Test-only construction of minimal DEX containers. Produces just
// enough structure for the parser: header, sorted string and type id
// tables, and class definitions. Checksum and signature fields are left
// zeroed (the parser does not verify them).
//
// Included verbatim by tests/common/mod.rs so unit and integration
// tests build containers from the same source.

use std::collections::BTreeSet;

const HEADER_LEN: usize = 0x70;
const CLASS_DEF_LEN: usize = 32;
const NO_INDEX: u32 = 0xffff_ffff;

/// Build a version-035 container defining `(descriptor, superclass)`
/// pairs.
pub(crate) fn build_dex(classes: &[(&str, Option<&str>)]) -> Vec<u8> {
    let strings: Vec<&str> = classes
        .iter()
        .flat_map(|(desc, sup)| std::iter::once(*desc).chain(sup.iter().copied()))
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .collect();
    let string_idx = |s: &str| strings.iter().position(|x| *x == s).unwrap() as u32;

    let string_ids_off = HEADER_LEN;
    let type_ids_off = string_ids_off + strings.len() * 4;
    let class_defs_off = type_ids_off + strings.len() * 4;
    let data_off = class_defs_off + classes.len() * CLASS_DEF_LEN;

    // String data items laid out in table order.
    let mut data_section = Vec::new();
    let mut string_offsets = Vec::with_capacity(strings.len());
    for s in &strings {
        string_offsets.push((data_off + data_section.len()) as u32);
        push_uleb128(&mut data_section, s.chars().count() as u32);
        data_section.extend_from_slice(s.as_bytes());
        data_section.push(0);
    }
    let total_len = data_off + data_section.len();

    let mut out = vec![0u8; data_off];
    out[0..4].copy_from_slice(b"dex\n");
    out[4..7].copy_from_slice(b"035");
    out[7] = 0;
    put_u32(&mut out, 32, total_len as u32); // file_size
    put_u32(&mut out, 36, HEADER_LEN as u32); // header_size
    put_u32(&mut out, 40, 0x1234_5678); // endian_tag
    put_u32(&mut out, 56, strings.len() as u32);
    put_u32(&mut out, 60, string_ids_off as u32);
    put_u32(&mut out, 64, strings.len() as u32);
    put_u32(&mut out, 68, type_ids_off as u32);
    put_u32(&mut out, 96, classes.len() as u32);
    put_u32(&mut out, 100, class_defs_off as u32);
    put_u32(&mut out, 104, data_section.len() as u32); // data_size
    put_u32(&mut out, 108, data_off as u32); // data_off

    for (i, off) in string_offsets.iter().enumerate() {
        put_u32(&mut out, string_ids_off + i * 4, *off);
    }
    // Type table indexes straight into the string table.
    for i in 0..strings.len() {
        put_u32(&mut out, type_ids_off + i * 4, i as u32);
    }
    for (i, (desc, sup)) in classes.iter().enumerate() {
        let off = class_defs_off + i * CLASS_DEF_LEN;
        put_u32(&mut out, off, string_idx(desc)); // class_idx
        put_u32(&mut out, off + 4, 1); // access_flags: public
        put_u32(
            &mut out,
            off + 8,
            sup.map(string_idx).unwrap_or(NO_INDEX), // superclass_idx
        );
        put_u32(&mut out, off + 16, NO_INDEX); // source_file_idx
    }

    out.extend_from_slice(&data_section);
    out
}

fn put_u32(buf: &mut [u8], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

fn push_uleb128(buf: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}
