//! Minimal MATLAB v5 (`.mat`) sparse-matrix reader/writer (spec.md §6).
//! Hand-rolled against the public MAT-file format v5 layout (no sparse
//! linear-algebra crate in the teacher's stack reads this container, so
//! this is a from-scratch binary codec, grounded on the format's published
//! structure rather than any one example repo): a 128-byte header
//! followed by a flat sequence of `miMATRIX` elements, one per named
//! sparse matrix, each holding array-flags/dimensions/name subelements
//! plus `ir`/`jc`/`pr` (row index / column pointer / real data) arrays.
//!
//! Only what this crate needs to round-trip its own five matrices is
//! implemented — no complex data, no structs/cells, no compression.

use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use tarjan_core::CscMatrix;

use crate::errors::BackgroundError;

const MI_INT8: u32 = 1;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MX_SPARSE_CLASS: u32 = 5;

const HEADER_TEXT: &[u8] = b"MATLAB 5.0 MAT-file, tarjan-background sparse export";

/// The five matrices a background system persists, in file order.
pub struct NamedMatrices {
    pub af: CscMatrix,
    pub ad: CscMatrix,
    pub bf: CscMatrix,
    pub a: Option<CscMatrix>,
    pub b: Option<CscMatrix>,
}

fn pad_to_8(buf: &mut Vec<u8>) {
    while buf.len() % 8 != 0 {
        buf.push(0);
    }
}

fn write_tagged(buf: &mut Vec<u8>, data_type: u32, payload: &[u8]) -> io::Result<()> {
    buf.write_u32::<LittleEndian>(data_type)?;
    buf.write_u32::<LittleEndian>(payload.len() as u32)?;
    buf.extend_from_slice(payload);
    pad_to_8(buf);
    Ok(())
}

fn write_matrix(buf: &mut Vec<u8>, name: &str, m: &CscMatrix) -> io::Result<()> {
    let mut flags = Vec::new();
    flags.write_u32::<LittleEndian>(MX_SPARSE_CLASS)?;
    flags.write_u32::<LittleEndian>(m.nnz() as u32)?; // nzmax

    let mut dims = Vec::new();
    dims.write_i32::<LittleEndian>(m.nrows() as i32)?;
    dims.write_i32::<LittleEndian>(m.ncols() as i32)?;

    let mut ir = Vec::new();
    let mut pr = Vec::new();
    for j in 0..m.ncols() {
        for (r, v) in m.col(j) {
            ir.write_i32::<LittleEndian>(r as i32)?;
            pr.write_f64::<LittleEndian>(v)?;
        }
    }

    let mut jc = Vec::new();
    let mut running = 0i32;
    jc.write_i32::<LittleEndian>(running)?;
    for j in 0..m.ncols() {
        running += m.col(j).count() as i32;
        jc.write_i32::<LittleEndian>(running)?;
    }

    let mut body = Vec::new();
    write_tagged(&mut body, MI_UINT32, &flags)?;
    write_tagged(&mut body, MI_INT32, &dims)?;
    write_tagged(&mut body, MI_INT8, name.as_bytes())?;
    write_tagged(&mut body, MI_INT32, &ir)?;
    write_tagged(&mut body, MI_INT32, &jc)?;
    write_tagged(&mut body, MI_DOUBLE, &pr)?;

    write_tagged(buf, MI_MATRIX, &body)
}

pub fn write(matrices: &NamedMatrices) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut header = vec![0u8; 128];
    header[..HEADER_TEXT.len()].copy_from_slice(HEADER_TEXT);
    header[124] = 0x00;
    header[125] = 0x01;
    header[126] = b'M';
    header[127] = b'I';
    buf.extend_from_slice(&header);

    write_matrix(&mut buf, "Af", &matrices.af).expect("writing to an in-memory Vec never fails");
    write_matrix(&mut buf, "Ad", &matrices.ad).expect("writing to an in-memory Vec never fails");
    write_matrix(&mut buf, "Bf", &matrices.bf).expect("writing to an in-memory Vec never fails");
    if let Some(a) = &matrices.a {
        write_matrix(&mut buf, "A", a).expect("writing to an in-memory Vec never fails");
    }
    if let Some(b) = &matrices.b {
        write_matrix(&mut buf, "B", b).expect("writing to an in-memory Vec never fails");
    }

    buf
}

struct ParsedMatrix {
    name: String,
    matrix: CscMatrix,
}

fn read_tagged(cursor: &mut Cursor<&[u8]>) -> io::Result<(u32, Vec<u8>)> {
    let data_type = cursor.read_u32::<LittleEndian>()?;
    let size = cursor.read_u32::<LittleEndian>()? as usize;
    let mut data = vec![0u8; size];
    cursor.read_exact(&mut data)?;
    let padding = (8 - (size % 8)) % 8;
    let mut discard = vec![0u8; padding];
    cursor.read_exact(&mut discard)?;
    Ok((data_type, data))
}

fn read_matrix(cursor: &mut Cursor<&[u8]>) -> io::Result<ParsedMatrix> {
    let (tag, body) = read_tagged(cursor)?;
    debug_assert_eq!(tag, MI_MATRIX);
    let mut body_cursor = Cursor::new(body.as_slice());

    let (_flags_tag, flags) = read_tagged(&mut body_cursor)?;
    let mut flags_cursor = Cursor::new(flags.as_slice());
    let _class = flags_cursor.read_u32::<LittleEndian>()?;
    let _nzmax = flags_cursor.read_u32::<LittleEndian>()?;

    let (_dims_tag, dims) = read_tagged(&mut body_cursor)?;
    let mut dims_cursor = Cursor::new(dims.as_slice());
    let nrows = dims_cursor.read_i32::<LittleEndian>()? as usize;
    let ncols = dims_cursor.read_i32::<LittleEndian>()? as usize;

    let (_name_tag, name_bytes) = read_tagged(&mut body_cursor)?;
    let name = String::from_utf8_lossy(&name_bytes).trim_end_matches('\0').to_string();

    let (_ir_tag, ir_bytes) = read_tagged(&mut body_cursor)?;
    let (_jc_tag, jc_bytes) = read_tagged(&mut body_cursor)?;
    let (_pr_tag, pr_bytes) = read_tagged(&mut body_cursor)?;

    let mut ir_cursor = Cursor::new(ir_bytes.as_slice());
    let mut ir = Vec::new();
    while (ir_cursor.position() as usize) < ir_bytes.len() {
        ir.push(ir_cursor.read_i32::<LittleEndian>()? as usize);
    }

    let mut jc_cursor = Cursor::new(jc_bytes.as_slice());
    let mut jc = Vec::new();
    while (jc_cursor.position() as usize) < jc_bytes.len() {
        jc.push(jc_cursor.read_i32::<LittleEndian>()? as usize);
    }

    let mut pr_cursor = Cursor::new(pr_bytes.as_slice());
    let mut pr = Vec::new();
    while (pr_cursor.position() as usize) < pr_bytes.len() {
        pr.push(pr_cursor.read_f64::<LittleEndian>()?);
    }

    let mut triplets = Vec::with_capacity(ir.len());
    for col in 0..ncols {
        for k in jc[col]..jc[col + 1] {
            triplets.push((ir[k], col, pr[k]));
        }
    }

    Ok(ParsedMatrix { name, matrix: CscMatrix::from_triplets(nrows, ncols, triplets) })
}

pub fn read(bytes: &[u8]) -> Result<NamedMatrices, BackgroundError> {
    if bytes.len() < 128 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "MAT v5 file shorter than the fixed header").into());
    }
    let mut cursor = Cursor::new(&bytes[128..]);

    let mut by_name = std::collections::HashMap::new();
    while (cursor.position() as usize) < cursor.get_ref().len() {
        let parsed = read_matrix(&mut cursor)?;
        by_name.insert(parsed.name, parsed.matrix);
    }

    let af = by_name.remove("Af").ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing Af matrix"))?;
    let ad = by_name.remove("Ad").ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing Ad matrix"))?;
    let bf = by_name.remove("Bf").ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing Bf matrix"))?;
    let a = by_name.remove("A");
    let b = by_name.remove("B");

    Ok(NamedMatrices { af, ad, bf, a, b })
}
