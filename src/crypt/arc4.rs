//! RC4 stream cipher.

pub struct Arc4 {
    i: usize,
    j: usize,
    state: [u8; 256],
}

impl Arc4 {
    pub fn new(key: &[u8]) -> Self {
        debug_assert!(!key.is_empty());
        let mut state = [0u8; 256];
        for (i, slot) in state.iter_mut().enumerate() {
            *slot = i as u8;
        }
        let mut j = 0usize;
        for i in 0..256 {
            j = (j + state[i] as usize + key[i % key.len()] as usize) % 256;
            state.swap(i, j);
        }
        Arc4 { i: 0, j: 0, state }
    }

    /// XOR the keystream over `src` into `dst`. The two slices must have the
    /// same length; `src` and `dst` may be the same allocation upstream.
    pub fn apply(&mut self, src: &[u8], dst: &mut [u8]) {
        debug_assert_eq!(src.len(), dst.len());
        for (s, d) in src.iter().zip(dst.iter_mut()) {
            self.i = (self.i + 1) % 256;
            self.j = (self.j + self.state[self.i] as usize) % 256;
            self.state.swap(self.i, self.j);
            let k = self.state[(self.state[self.i] as usize + self.state[self.j] as usize) % 256];
            *d = s ^ k;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crypt(key: &[u8], message: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; message.len()];
        Arc4::new(key).apply(message, &mut out);
        out
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            crypt(b"key", b"message"),
            [0x66, 0x09, 0x47, 0x9E, 0x45, 0xE8, 0x1E]
        );
        assert_eq!(
            crypt(b"0", b"message"),
            [0xE5, 0x1A, 0xD5, 0xF3, 0xA2, 0x1C, 0xB1]
        );
        assert_eq!(crypt(b"0", b"0"), [0xB8]);
    }

    #[test]
    fn test_symmetric() {
        let data = b"stream cipher round trip".to_vec();
        let once = crypt(b"secret", &data);
        let twice = crypt(b"secret", &once);
        assert_eq!(twice, data);
    }
}
