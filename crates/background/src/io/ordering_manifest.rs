//! `<base>.ordering.json.gz` (de)serialization (spec.md §6): a gzip-JSON
//! object `{ "foreground": [...], "background": [...], "exterior": [...] }`,
//! each entry a `[flow_ref, direction, term_ref, scc_id]` 4-tuple. Grounded
//! on the teacher's `serde_json` usage plus `flate2` for the gzip layer
//! (both already in the workspace's ambient stack).

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;

use tarjan_core::{Direction, TermRef};

use crate::errors::BackgroundError;

fn invalid_data(msg: impl Into<String>) -> BackgroundError {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.into()).into()
}

fn term_to_json(t: &TermRef) -> serde_json::Value {
    json!([t.flow_ref, t.direction.to_string(), t.term_ref, t.scc_id])
}

fn term_from_json(v: &serde_json::Value) -> Result<TermRef, BackgroundError> {
    let arr = v.as_array().ok_or_else(|| invalid_data("ordering entry is not a 4-tuple"))?;
    if arr.len() != 4 {
        return Err(invalid_data(format!("ordering entry has {} elements, expected 4", arr.len())));
    }
    let flow_ref = arr[0].as_str().ok_or_else(|| invalid_data("flow_ref is not a string"))?.to_string();
    let direction: Direction = arr[1]
        .as_str()
        .ok_or_else(|| invalid_data("direction is not a string"))?
        .parse()
        .map_err(invalid_data)?;
    let term_ref = arr[2].as_str().ok_or_else(|| invalid_data("term_ref is not a string"))?.to_string();
    let scc_id = arr[3].as_str().map(str::to_string);
    Ok(TermRef::new(flow_ref, direction, term_ref, scc_id))
}

fn parse_list(root: &serde_json::Value, key: &str) -> Result<Vec<TermRef>, BackgroundError> {
    root.get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| invalid_data(format!("manifest missing '{key}' list")))?
        .iter()
        .map(term_from_json)
        .collect()
}

pub fn write(fg: &[TermRef], bg: &[TermRef], ex: &[TermRef]) -> Result<Vec<u8>, BackgroundError> {
    let value = json!({
        "foreground": fg.iter().map(term_to_json).collect::<Vec<_>>(),
        "background": bg.iter().map(term_to_json).collect::<Vec<_>>(),
        "exterior": ex.iter().map(term_to_json).collect::<Vec<_>>(),
    });
    let json_bytes = serde_json::to_vec(&value)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json_bytes)?;
    Ok(encoder.finish()?)
}

pub fn read(bytes: &[u8]) -> Result<(Vec<TermRef>, Vec<TermRef>, Vec<TermRef>), BackgroundError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut json_bytes = Vec::new();
    decoder.read_to_end(&mut json_bytes)?;
    let value: serde_json::Value = serde_json::from_slice(&json_bytes)?;
    Ok((parse_list(&value, "foreground")?, parse_list(&value, "background")?, parse_list(&value, "exterior")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_three_lists() {
        let fg = vec![TermRef::new("f1", Direction::Output, "P1", None)];
        let bg = vec![TermRef::new("f2", Direction::Output, "P2", Some("P2".to_string()))];
        let ex = vec![TermRef::new("e", Direction::Output, "air; urban", None)];

        let bytes = write(&fg, &bg, &ex).unwrap();
        let (fg2, bg2, ex2) = read(&bytes).unwrap();
        assert_eq!(fg, fg2);
        assert_eq!(bg, bg2);
        assert_eq!(ex, ex2);
    }

    #[test]
    fn rejects_malformed_entries() {
        let value = json!({ "foreground": [[1, 2]], "background": [], "exterior": [] });
        let json_bytes = serde_json::to_vec(&value).unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json_bytes).unwrap();
        let bytes = encoder.finish().unwrap();
        assert!(read(&bytes).is_err());
    }
}
