use crate::error::PackError;

/// Clamp on unpacked output size. The reference implementation sizes its output
/// buffer at `1<<30` and treats overflow as unbounded; we turn it into an error.
pub const MAX_UNPACK_SIZE: usize = 1 << 30;

/// Pack (compress) sproto binary data using the zero-packing algorithm.
///
/// Similar to Cap'n Proto packing. Each 8-byte word is reduced to a tag byte
/// followed by non-zero content bytes. Tag 0xFF handles the case where most
/// bytes are non-zero.
pub fn pack(src: &[u8]) -> Vec<u8> {
    let srcsz = src.len();
    if srcsz == 0 {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(srcsz);
    let mut i = 0;

    // State for 0xFF run batching
    let mut ff_src_start: usize = 0;
    let mut ff_des_start: usize = 0;
    let mut ff_n: usize = 0;

    while i < srcsz {
        // Get 8-byte chunk, padding with zeros if needed
        let mut chunk = [0u8; 8];
        let remaining = srcsz - i;
        let copy_len = remaining.min(8);
        chunk[..copy_len].copy_from_slice(&src[i..i + copy_len]);

        let (tag, mut notzero) = compute_tag(&chunk);

        // Promote 6/7 non-zero to 8 ONLY when already in an FF run
        if (notzero == 6 || notzero == 7) && ff_n > 0 {
            notzero = 8;
        }

        if notzero == 8 {
            if ff_n > 0 {
                // Continue FF run: reserve 8 more bytes for raw data
                ff_n += 1;
                result.extend_from_slice(&[0u8; 8]);
                if ff_n == 256 {
                    write_ff_data(src, srcsz, &mut result, ff_src_start, ff_des_start, ff_n);
                    ff_n = 0;
                }
            } else {
                // Start new FF run: reserve 10 bytes (tag + count + 8 data)
                ff_src_start = i;
                ff_des_start = result.len();
                ff_n = 1;
                result.extend_from_slice(&[0u8; 10]);
            }
        } else {
            if ff_n > 0 {
                // Flush pending FF run
                write_ff_data(src, srcsz, &mut result, ff_src_start, ff_des_start, ff_n);
                ff_n = 0;
            }

            // Normal pack: tag byte + non-zero bytes
            result.push(tag);
            for &byte in &chunk {
                if byte != 0 {
                    result.push(byte);
                }
            }
        }

        i += 8;
    }

    if ff_n > 0 {
        write_ff_data(src, srcsz, &mut result, ff_src_start, ff_des_start, ff_n);
    }

    result
}

fn compute_tag(chunk: &[u8; 8]) -> (u8, usize) {
    let mut tag: u8 = 0;
    let mut notzero = 0;
    for (i, &byte) in chunk.iter().enumerate() {
        if byte != 0 {
            notzero += 1;
            tag |= 1 << i;
        }
    }
    (tag, notzero)
}

fn write_ff_data(
    src: &[u8],
    src_len: usize,
    result: &mut Vec<u8>,
    src_start: usize,
    des_start: usize,
    n: usize,
) {
    let total_bytes = n * 8;
    result[des_start] = 0xFF;
    result[des_start + 1] = (n - 1) as u8;

    // Copy actual data, zero-padding if past end of source
    let src_end = (src_start + total_bytes).min(src_len);
    let available = src_end - src_start;
    result[des_start + 2..des_start + 2 + available]
        .copy_from_slice(&src[src_start..src_end]);
    // Zero-fill any remaining
    for b in result[des_start + 2 + available..des_start + 2 + total_bytes].iter_mut() {
        *b = 0;
    }

    // Truncate result to exactly des_start + 2 + total_bytes
    result.truncate(des_start + 2 + total_bytes);
}

/// Unpack (decompress) sproto packed data.
pub fn unpack(src: &[u8]) -> Result<Vec<u8>, PackError> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < src.len() {
        if result.len() > MAX_UNPACK_SIZE {
            return Err(PackError::TooLarge {
                size: result.len(),
                max: MAX_UNPACK_SIZE,
            });
        }

        let header = src[i];
        i += 1;

        if header == 0xFF {
            if i >= src.len() {
                return Err(PackError::InvalidData(
                    "0xFF tag at end of data without count byte".into(),
                ));
            }
            let n = (src[i] as usize + 1) * 8;
            i += 1;
            if i + n > src.len() {
                return Err(PackError::InvalidData(format!(
                    "0xFF run needs {} bytes but only {} available",
                    n,
                    src.len() - i
                )));
            }
            if result.len() + n > MAX_UNPACK_SIZE {
                return Err(PackError::TooLarge {
                    size: result.len() + n,
                    max: MAX_UNPACK_SIZE,
                });
            }
            result.extend_from_slice(&src[i..i + n]);
            i += n;
        } else {
            for bit in 0..8 {
                if header & (1 << bit) != 0 {
                    if i >= src.len() {
                        return Err(PackError::InvalidData(
                            "truncated packed data in normal segment".into(),
                        ));
                    }
                    result.push(src[i]);
                    i += 1;
                } else {
                    result.push(0);
                }
            }
        }
    }

    Ok(result)
}
