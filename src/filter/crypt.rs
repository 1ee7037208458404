//! Decryption filters: streaming RC4 and AES-CBC with PKCS#7 padding.

use crate::buffer::Buffer;
use crate::crypt::{Aes, Arc4};
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterStatus};

/// Byte-oriented RC4 XOR filter.
pub struct Arc4Filter {
    arc4: Arc4,
}

impl Arc4Filter {
    pub fn new(key: &[u8]) -> Self {
        Arc4Filter {
            arc4: Arc4::new(key),
        }
    }
}

impl Filter for Arc4Filter {
    fn name(&self) -> &'static str {
        "arc4"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        loop {
            if input.remaining() == 0 {
                if input.at_eof() {
                    return Ok(FilterStatus::Done);
                }
                return Ok(FilterStatus::NeedInput);
            }
            if output.space() == 0 {
                return Ok(FilterStatus::NeedOutput);
            }
            let n = input.remaining().min(output.space());
            let src: Vec<u8> = input.readable()[..n].to_vec();
            self.arc4.apply(&src, &mut output.writable()[..n]);
            input.consume(n);
            output.commit(n);
        }
    }
}

/// AES-CBC decryption: the first 16 input bytes are the IV, the rest is
/// whole-block ciphertext; PKCS#7 padding is trimmed at end of data.
pub struct AesCbcDecode {
    aes: Aes,
    iv: [u8; 16],
    iv_count: usize,
}

impl AesCbcDecode {
    /// Key must be 16, 24 or 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        Ok(AesCbcDecode {
            aes: Aes::new(key)?,
            iv: [0; 16],
            iv_count: 0,
        })
    }
}

impl Filter for AesCbcDecode {
    fn name(&self) -> &'static str {
        "aesd"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        loop {
            if input.remaining() < 16 {
                if input.at_eof() {
                    // The pad is a mandatory unit: a stream that ends before
                    // the IV, or mid-block, is corrupt rather than short.
                    if self.iv_count < 16 {
                        return Err(Error::filter("aesd", "truncated initialization vector"));
                    }
                    if input.remaining() > 0 {
                        return Err(Error::filter(
                            "aesd",
                            format!("partial final block of {} bytes", input.remaining()),
                        ));
                    }
                    return Ok(FilterStatus::Done);
                }
                return Ok(FilterStatus::NeedInput);
            }

            if self.iv_count < 16 {
                self.iv[self.iv_count] = input.readable()[0];
                self.iv_count += 1;
                input.consume(1);
            } else {
                if output.space() < 16 {
                    return Ok(FilterStatus::NeedOutput);
                }

                let n = (input.remaining().min(output.space()) / 16) * 16;
                let src: Vec<u8> = input.readable()[..n].to_vec();
                self.aes
                    .cbc_decrypt(&mut self.iv, &src, &mut output.writable()[..n]);
                input.consume(n);
                output.commit(n);

                if input.at_eof() && input.remaining() == 0 {
                    let readable = output.readable();
                    let pad = usize::from(readable[readable.len() - 1]);
                    if !(1..=16).contains(&pad) {
                        return Err(Error::filter(
                            "aesd",
                            format!("padding out of range: {pad}"),
                        ));
                    }
                    output.uncommit(pad);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Stage;

    fn drive(filter: impl Filter + 'static, input: &[u8]) -> Result<Vec<u8>> {
        let mut stage = Stage::new(filter);
        let mut inbuf = Buffer::from_bytes(input.to_vec());
        let mut collected = Vec::new();
        loop {
            let mut out = Buffer::with_capacity(64);
            let status = stage.process(&mut inbuf, &mut out)?;
            collected.extend_from_slice(out.readable());
            match status {
                FilterStatus::Done => return Ok(collected),
                FilterStatus::NeedOutput => {}
                FilterStatus::NeedInput => return Ok(collected),
            }
        }
    }

    fn encrypt_with_padding(key: &[u8], iv: [u8; 16], plain: &[u8]) -> Vec<u8> {
        let aes = Aes::new(key).unwrap();
        let pad = 16 - plain.len() % 16;
        let mut padded = plain.to_vec();
        padded.extend(std::iter::repeat_n(pad as u8, pad));
        let mut ciphertext = vec![0u8; padded.len()];
        let mut chain = iv;
        aes.cbc_encrypt(&mut chain, &padded, &mut ciphertext);
        let mut stream = iv.to_vec();
        stream.extend_from_slice(&ciphertext);
        stream
    }

    #[test]
    fn test_aes_cbc_filter_roundtrip() {
        let key = [0x2Bu8; 16];
        let plain = b"attack at dawn, bring umbrellas";
        let stream = encrypt_with_padding(&key, [9; 16], plain);
        assert_eq!(
            drive(AesCbcDecode::new(&key).unwrap(), &stream).unwrap(),
            plain
        );
    }

    #[test]
    fn test_aes_cbc_full_pad_block_trims_to_empty() {
        let key = [0u8; 16];
        // A multiple-of-16 plaintext gains a whole block of 0x10 padding.
        let stream = encrypt_with_padding(&key, [0; 16], b"0123456789abcdef");
        assert_eq!(
            drive(AesCbcDecode::new(&key).unwrap(), &stream).unwrap(),
            b"0123456789abcdef"
        );
        let empty = encrypt_with_padding(&key, [0; 16], b"");
        assert_eq!(
            drive(AesCbcDecode::new(&key).unwrap(), &empty).unwrap(),
            b""
        );
    }

    #[test]
    fn test_aes_cbc_truncated_stream_fails() {
        let key = [0u8; 16];
        // Shorter than the IV itself.
        assert!(drive(AesCbcDecode::new(&key).unwrap(), &[0u8; 10]).is_err());
        // An IV with no ciphertext blocks.
        assert!(drive(AesCbcDecode::new(&key).unwrap(), &[0u8; 16]).is_err());
        // A partial final block after whole ones.
        let mut stream = encrypt_with_padding(&key, [0; 16], b"block sized input");
        stream.truncate(stream.len() - 5);
        assert!(drive(AesCbcDecode::new(&key).unwrap(), &stream).is_err());
    }

    #[test]
    fn test_aes_cbc_bad_padding() {
        let key = [1u8; 16];
        let aes = Aes::new(&key).unwrap();
        // Craft a "padded" block whose final byte is zero.
        let block = *b"fifteen bytes..\x00";
        let mut ciphertext = [0u8; 16];
        let mut iv = [0u8; 16];
        aes.cbc_encrypt(&mut iv, &block, &mut ciphertext);
        let mut stream = vec![0u8; 16];
        stream.extend_from_slice(&ciphertext);
        assert!(drive(AesCbcDecode::new(&key).unwrap(), &stream).is_err());
    }

    #[test]
    fn test_aes_cbc_rejects_bad_key_length() {
        assert!(AesCbcDecode::new(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_arc4_filter() {
        let plain = b"some licensing payload";
        let mut encrypted = vec![0u8; plain.len()];
        Arc4::new(b"key").apply(plain, &mut encrypted);
        assert_eq!(
            drive(Arc4Filter::new(b"key"), &encrypted).unwrap(),
            plain
        );
    }
}
