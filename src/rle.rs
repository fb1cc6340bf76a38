//! Run-length coding used by compressed printer data packets.
//!
//! Each run starts with a control byte. With the high bit set the next byte
//! is repeated `(control & 0x7F) + 2` times, otherwise the next
//! `control + 1` bytes are copied verbatim.

use std::iter;

const REPEAT_FLAG: u8 = 0x80;

/// Longest run a single repeat control byte can express.
const MAX_REPEAT: usize = 0x7F + 2;

/// Longest run a single literal control byte can express.
const MAX_LITERAL: usize = 0x7F + 1;

/// Expand run-length coded bytes.
///
/// Malformed input never fails: a run cut short by the end of the input
/// just yields the bytes that are actually there.
pub fn decompress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut i = 0;

    while i < data.len() {
        let control = data[i];
        i += 1;

        if control & REPEAT_FLAG != 0 {
            let count = (control & !REPEAT_FLAG) as usize + 2;
            match data.get(i) {
                Some(&value) => {
                    out.extend(iter::repeat(value).take(count));
                    i += 1;
                }
                None => break,
            }
        } else {
            let count = control as usize + 1;
            let end = (i + count).min(data.len());
            out.extend_from_slice(&data[i..end]);
            i = end;
        }
    }

    out
}

/// Run-length code `data` so that [`decompress`] gives it back unchanged.
///
/// Two or more equal bytes become a repeat run; everything else is grouped
/// into literal runs that stop right before the next repeat.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut packed = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let run_value = data[i];
        let mut run_length = 1;

        while i + run_length < data.len()
            && run_length < MAX_REPEAT
            && data[i + run_length] == run_value
        {
            run_length += 1;
        }

        if run_length >= 2 {
            packed.push(REPEAT_FLAG | (run_length - 2) as u8);
            packed.push(run_value);
            i += run_length;
        } else {
            let mut literal_run = 1;
            while i + literal_run < data.len()
                && literal_run < MAX_LITERAL
                && !starts_repeat(data, i + literal_run)
            {
                literal_run += 1;
            }

            packed.push((literal_run - 1) as u8);
            packed.extend_from_slice(&data[i..i + literal_run]);
            i += literal_run;
        }
    }

    packed
}

fn starts_repeat(data: &[u8], at: usize) -> bool {
    at + 1 < data.len() && data[at] == data[at + 1]
}
