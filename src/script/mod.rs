//! Harness-side script parsing
//!
//! The benchmarking driver feeds the store from three plain-text
//! formats: edit scripts, combined edit+query scripts, and substring
//! extraction scripts. Parsing lives here, outside the core; the store
//! itself never touches a file.
//!
//! Edit lines are `I <position> <text>`, `D <start> <end-inclusive>`,
//! `S <position> <text>`. Query lines are
//! `Q <pattern> <flag> <count>` with the trailing two fields accepted
//! and ignored. Extraction lines are `position,length` pairs.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};

/// One mutation from an edit script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    /// Insert `text` before logical `position`.
    Insert {
        /// Logical insertion point.
        position: usize,
        /// Inserted bytes.
        text: Vec<u8>,
    },
    /// Delete the inclusive logical range `[start, end]`.
    Delete {
        /// First deleted position.
        start: usize,
        /// Last deleted position (inclusive, per the script format).
        end: usize,
    },
    /// Substitute bytes in place at logical `position`.
    Substitute {
        /// Logical substitution point.
        position: usize,
        /// Replacement bytes.
        text: Vec<u8>,
    },
}

impl EditOp {
    /// Length of the deleted range for `Delete`, in characters.
    pub fn delete_len(start: usize, end: usize) -> usize {
        end - start + 1
    }
}

/// One line of a combined edit+query script, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOp {
    /// An edit line.
    Edit(EditOp),
    /// A search query line; only the pattern is meaningful.
    Query(Vec<u8>),
}

/// Parse an edit script from a reader.
pub fn parse_edit_script<R: BufRead>(reader: R) -> Result<Vec<EditOp>> {
    let mut edits = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        edits.push(parse_edit_line(&line, line_no + 1)?);
    }
    Ok(edits)
}

/// Parse a combined edit+query script from a reader, preserving file
/// order.
pub fn parse_mixed_script<R: BufRead>(reader: R) -> Result<Vec<ScriptOp>> {
    let mut ops = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('Q') {
            let mut fields = trimmed.split_whitespace();
            fields.next(); // the Q tag
            let pattern = fields
                .next()
                .with_context(|| format!("line {}: query without a pattern", line_no + 1))?;
            // Trailing flag and count fields are part of the format but
            // carry nothing the harness needs.
            ops.push(ScriptOp::Query(pattern.as_bytes().to_vec()));
        } else {
            ops.push(ScriptOp::Edit(parse_edit_line(trimmed, line_no + 1)?));
        }
    }
    Ok(ops)
}

/// Parse a substring-extraction script: one `position,length` pair per
/// line.
pub fn parse_extract_script<R: BufRead>(reader: R) -> Result<Vec<(usize, usize)>> {
    let mut pairs = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (pos, len) = trimmed
            .split_once(',')
            .with_context(|| format!("line {}: expected position,length", line_no + 1))?;
        let position: usize = pos
            .trim()
            .parse()
            .with_context(|| format!("line {}: invalid position '{}'", line_no + 1, pos))?;
        let length: usize = len
            .trim()
            .parse()
            .with_context(|| format!("line {}: invalid length '{}'", line_no + 1, len))?;
        pairs.push((position, length));
    }
    Ok(pairs)
}

fn parse_edit_line(line: &str, line_no: usize) -> Result<EditOp> {
    let mut fields = line.split_whitespace();
    let op = fields
        .next()
        .with_context(|| format!("line {line_no}: empty edit"))?;
    let first = fields
        .next()
        .with_context(|| format!("line {line_no}: missing first argument"))?;
    let second = fields
        .next()
        .with_context(|| format!("line {line_no}: missing second argument"))?;

    let parse_pos = |field: &str| -> Result<usize> {
        field
            .parse()
            .with_context(|| format!("line {line_no}: invalid position '{field}'"))
    };

    match op {
        "I" => Ok(EditOp::Insert {
            position: parse_pos(first)?,
            text: second.as_bytes().to_vec(),
        }),
        "D" => {
            let start = parse_pos(first)?;
            let end = parse_pos(second)?;
            if end < start {
                bail!("line {line_no}: delete range ends before it starts");
            }
            Ok(EditOp::Delete { start, end })
        }
        "S" => Ok(EditOp::Substitute {
            position: parse_pos(first)?,
            text: second.as_bytes().to_vec(),
        }),
        other => bail!("line {line_no}: unknown edit operation '{other}'"),
    }
}

/// Load a reference sequence: plain bytes, or FASTA-style input whose
/// header lines are stripped. Whitespace is removed and the sequence is
/// uppercased.
pub fn read_sequence<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let mut contents = String::new();
    File::open(path)
        .and_then(|mut f| f.read_to_string(&mut contents))
        .with_context(|| format!("failed to read sequence from {}", path.display()))?;
    let sequence: String = contents
        .lines()
        .filter(|line| !line.starts_with('>') && !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("");
    Ok(sequence.trim().to_ascii_uppercase().into_bytes())
}

/// Open a script file as a buffered reader with a contextual error.
pub fn open_script<P: AsRef<Path>>(path: P) -> Result<BufReader<File>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("failed to open script {}", path.display()))?;
    Ok(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_the_three_edit_kinds() {
        let script = "I 4439799 T\nS 2261415 C\nD 494753 494755\n";
        let edits = parse_edit_script(Cursor::new(script)).unwrap();
        assert_eq!(
            edits,
            vec![
                EditOp::Insert {
                    position: 4_439_799,
                    text: b"T".to_vec()
                },
                EditOp::Substitute {
                    position: 2_261_415,
                    text: b"C".to_vec()
                },
                EditOp::Delete {
                    start: 494_753,
                    end: 494_755
                },
            ]
        );
        assert_eq!(EditOp::delete_len(494_753, 494_755), 3);
    }

    #[test]
    fn skips_blank_lines() {
        let script = "\nI 1 A\n\n\nD 2 2\n";
        let edits = parse_edit_script(Cursor::new(script)).unwrap();
        assert_eq!(edits.len(), 2);
    }

    #[test]
    fn rejects_malformed_edits() {
        assert!(parse_edit_script(Cursor::new("X 1 A\n")).is_err());
        assert!(parse_edit_script(Cursor::new("I 1\n")).is_err());
        assert!(parse_edit_script(Cursor::new("I x A\n")).is_err());
        assert!(parse_edit_script(Cursor::new("D 5 3\n")).is_err());
    }

    #[test]
    fn mixed_scripts_interleave_in_file_order() {
        let script = "I 442077 ATC\nD 3975001 3975005\nQ GCGCCAGCGTCGGCAAGGGT N 1\nI 2052837 GCG\nQ TGTTAACGCG N 1\n";
        let ops = parse_mixed_script(Cursor::new(script)).unwrap();
        assert_eq!(ops.len(), 5);
        assert!(matches!(ops[0], ScriptOp::Edit(EditOp::Insert { .. })));
        assert!(matches!(ops[1], ScriptOp::Edit(EditOp::Delete { .. })));
        assert_eq!(ops[2], ScriptOp::Query(b"GCGCCAGCGTCGGCAAGGGT".to_vec()));
        assert!(matches!(ops[3], ScriptOp::Edit(EditOp::Insert { .. })));
        assert_eq!(ops[4], ScriptOp::Query(b"TGTTAACGCG".to_vec()));
    }

    #[test]
    fn extraction_pairs_parse_with_whitespace() {
        let script = "4015907,46\n1197216, 4\n\n3940536,38\n";
        let pairs = parse_extract_script(Cursor::new(script)).unwrap();
        assert_eq!(pairs, vec![(4_015_907, 46), (1_197_216, 4), (3_940_536, 38)]);
        assert!(parse_extract_script(Cursor::new("12 34\n")).is_err());
    }
}
