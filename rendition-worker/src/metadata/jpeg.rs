//! JPEG encoder quality estimation.
//!
//! The luminance quantization table of a baseline JPEG is a scaled copy of the
//! IJG reference table. Comparing the sums of both tables recovers the scale
//! factor, and with it the quality setting the encoder was given. Very low
//! qualities saturate at 255 and read high.

/// IJG reference luminance table (Annex K of ITU T.81).
const STD_LUMINANCE: [u16; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, //
    12, 12, 14, 19, 26, 58, 60, 55, //
    14, 13, 16, 24, 40, 57, 69, 56, //
    14, 17, 22, 29, 51, 87, 80, 62, //
    18, 22, 37, 56, 68, 109, 103, 77, //
    24, 35, 55, 64, 81, 104, 113, 92, //
    49, 64, 78, 87, 103, 121, 120, 101, //
    72, 92, 95, 98, 112, 100, 103, 99,
];

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const DQT: u8 = 0xDB;

/// Estimate the quality (1 - 100) a JPEG was encoded with.
///
/// Returns `None` when `bytes` is not a JPEG or carries no luminance table.
pub fn estimate_quality(bytes: &[u8]) -> Option<u8> {
    let table = luminance_table(bytes)?;
    if table.iter().all(|&q| q == 1) {
        return Some(100);
    }

    let sum: u32 = table.iter().map(|&q| u32::from(q)).sum();
    let std_sum: u32 = STD_LUMINANCE.iter().map(|&q| u32::from(q)).sum();
    let scale = f64::from(sum) * 100.0 / f64::from(std_sum);
    let quality = if scale <= 100.0 {
        (200.0 - scale) / 2.0
    } else {
        5000.0 / scale
    };
    Some(quality.round().clamp(1.0, 100.0) as u8)
}

/// Find quantization table 0 by walking the marker segments up to the scan.
fn luminance_table(bytes: &[u8]) -> Option<[u16; 64]> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != SOI {
        return None;
    }

    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        match marker {
            0xFF => {
                pos += 1;
                continue;
            }
            EOI | SOS => return None,
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            _ => {}
        }

        let len = usize::from(u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]));
        let end = pos + 2 + len;
        if len < 2 || end > bytes.len() {
            return None;
        }

        if marker == DQT {
            let mut segment = &bytes[pos + 4..end];
            while let Some(&info) = segment.first() {
                let wide = info >> 4 != 0;
                let id = info & 0x0F;
                let size = if wide { 128 } else { 64 };
                if segment.len() < 1 + size {
                    return None;
                }
                if id == 0 {
                    let values = &segment[1..=size];
                    let mut table = [0u16; 64];
                    for (i, value) in table.iter_mut().enumerate() {
                        *value = if wide {
                            u16::from_be_bytes([values[2 * i], values[2 * i + 1]])
                        } else {
                            u16::from(values[i])
                        };
                    }
                    return Some(table);
                }
                segment = &segment[1 + size..];
            }
        }
        pos = end;
    }
    None
}
