use bytes::{Buf, BufMut};

// Readers return `None` on truncated input instead of panicking like `Buf` does.

pub(crate) fn get_ssh_string<'a>(b: &mut &'a [u8]) -> Option<&'a [u8]> {
    if b.remaining() < 4 {
        return None;
    }
    let len = b.get_u32() as usize;
    if b.remaining() < len {
        return None;
    }
    let data: &'a [u8] = *b;
    let (s, rest) = data.split_at(len);
    *b = rest;
    Some(s)
}

pub(crate) fn get_u32(b: &mut &[u8]) -> Option<u32> {
    if b.remaining() < 4 {
        return None;
    }
    Some(b.get_u32())
}

pub(crate) fn get_u64(b: &mut &[u8]) -> Option<u64> {
    if b.remaining() < 8 {
        return None;
    }
    Some(b.get_u64())
}

pub(crate) fn put_ssh_string<B: BufMut>(mut b: B, s: &[u8]) {
    let len = s.len() as u32;
    b.put_u32(len);
    b.put_slice(s);
}

/// Strips the sign-padding zeros of an SSH `mpint`.
pub(crate) fn trim_mpint(mut n: &[u8]) -> &[u8] {
    while let [0, rest @ ..] = n {
        n = rest;
    }
    n
}
