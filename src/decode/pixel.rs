//! Pixel-format unpacking to RGBA8.
//!
//! Every supported format has one row in [`UNPACKERS`], keyed by the
//! engine's texture-format id.  Packed formats convert one pixel at a time;
//! block formats (BC1/DXT1, BC3/DXT5) decode 4x4 tiles and clip the tiles
//! that hang over the right or bottom edge.  Rows are emitted top-down in
//! storage order.  Multi-byte packed values are little-endian.

use byteorder::{ByteOrder, LittleEndian};

use super::DecodeError;

#[derive(Clone, Copy)]
pub enum Layout {
    Packed {
        bytes_per_pixel: usize,
        to_rgba:         fn(&[u8]) -> [u8; 4],
    },
    Block {
        block_bytes: usize,
        decode:      fn(&[u8], &mut [[u8; 4]; 16]),
    },
}

#[derive(Clone, Copy)]
pub struct PixelUnpacker {
    pub format: i64,
    pub name:   &'static str,
    pub layout: Layout,
}

const fn packed(format: i64, name: &'static str, bytes_per_pixel: usize, to_rgba: fn(&[u8]) -> [u8; 4]) -> PixelUnpacker {
    PixelUnpacker { format, name, layout: Layout::Packed { bytes_per_pixel, to_rgba } }
}

const fn block(format: i64, name: &'static str, block_bytes: usize, decode: fn(&[u8], &mut [[u8; 4]; 16])) -> PixelUnpacker {
    PixelUnpacker { format, name, layout: Layout::Block { block_bytes, decode } }
}

pub static UNPACKERS: &[PixelUnpacker] = &[
    packed(1,  "Alpha8",   1, |p| [255, 255, 255, p[0]]),
    packed(2,  "ARGB4444", 2, argb4444),
    packed(3,  "RGB24",    3, |p| [p[0], p[1], p[2], 255]),
    packed(4,  "RGBA32",   4, |p| [p[0], p[1], p[2], p[3]]),
    packed(5,  "ARGB32",   4, |p| [p[1], p[2], p[3], p[0]]),
    packed(7,  "RGB565",   2, |p| rgb565(LittleEndian::read_u16(p))),
    packed(9,  "R16",      2, |p| [(LittleEndian::read_u16(p) >> 8) as u8, 0, 0, 255]),
    block(10,  "DXT1",     8, decode_bc1),
    block(12,  "DXT5",    16, decode_bc3),
    packed(13, "RGBA4444", 2, rgba4444),
    packed(14, "BGRA32",   4, |p| [p[2], p[1], p[0], p[3]]),
    packed(62, "RG16",     2, |p| [p[0], p[1], 0, 255]),
    packed(63, "R8",       1, |p| [p[0], 0, 0, 255]),
];

pub fn unpacker_for(format: i64) -> Option<&'static PixelUnpacker> {
    UNPACKERS.iter().find(|u| u.format == format)
}

impl PixelUnpacker {
    /// Bytes occupied by the top mip level of a `width`x`height` image.
    pub fn level_size(&self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self.layout {
            Layout::Packed { bytes_per_pixel, .. } => w * h * bytes_per_pixel,
            Layout::Block { block_bytes, .. } => w.div_ceil(4) * h.div_ceil(4) * block_bytes,
        }
    }

    /// Unpack the top mip level into a `width * height * 4` RGBA buffer.
    pub fn unpack(&self, data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, DecodeError> {
        let expected = self.level_size(width, height);
        if data.len() < expected {
            return Err(DecodeError::PixelDataTooShort { expected, actual: data.len() });
        }
        let (w, h) = (width as usize, height as usize);
        let mut out = vec![0u8; w * h * 4];

        match self.layout {
            Layout::Packed { bytes_per_pixel, to_rgba } => {
                for (src, dst) in data[..expected]
                    .chunks_exact(bytes_per_pixel)
                    .zip(out.chunks_exact_mut(4))
                {
                    dst.copy_from_slice(&to_rgba(src));
                }
            }
            Layout::Block { block_bytes, decode } => {
                let blocks_x = w.div_ceil(4);
                let mut tile = [[0u8; 4]; 16];
                for (i, src) in data[..expected].chunks_exact(block_bytes).enumerate() {
                    decode(src, &mut tile);
                    let (bx, by) = ((i % blocks_x) * 4, (i / blocks_x) * 4);
                    for ty in 0..4 {
                        let y = by + ty;
                        if y >= h {
                            break;
                        }
                        for tx in 0..4 {
                            let x = bx + tx;
                            if x >= w {
                                break;
                            }
                            let at = (y * w + x) * 4;
                            out[at..at + 4].copy_from_slice(&tile[ty * 4 + tx]);
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

// ── Packed conversions ───────────────────────────────────────────────────────

#[inline]
fn expand4(v: u16) -> u8 { (v & 0xF) as u8 * 17 }

#[inline]
fn expand5(v: u16) -> u8 { let v = (v & 0x1F) as u8; (v << 3) | (v >> 2) }

#[inline]
fn expand6(v: u16) -> u8 { let v = (v & 0x3F) as u8; (v << 2) | (v >> 4) }

fn argb4444(p: &[u8]) -> [u8; 4] {
    let v = LittleEndian::read_u16(p);
    [expand4(v >> 8), expand4(v >> 4), expand4(v), expand4(v >> 12)]
}

fn rgba4444(p: &[u8]) -> [u8; 4] {
    let v = LittleEndian::read_u16(p);
    [expand4(v >> 12), expand4(v >> 8), expand4(v >> 4), expand4(v)]
}

fn rgb565(v: u16) -> [u8; 4] {
    [expand5(v >> 11), expand6(v >> 5), expand5(v), 255]
}

// ── Block compression ────────────────────────────────────────────────────────

/// Colour half of a BC1/BC3 block.  `punch_through` enables the BC1
/// three-colour + transparent mode when `c0 <= c1`.
fn decode_color_block(src: &[u8], punch_through: bool, tile: &mut [[u8; 4]; 16]) {
    let c0 = LittleEndian::read_u16(&src[0..2]);
    let c1 = LittleEndian::read_u16(&src[2..4]);
    let indices = LittleEndian::read_u32(&src[4..8]);

    let (a, b) = (rgb565(c0), rgb565(c1));
    let mix = |wa: u16, wb: u16, div: u16| -> [u8; 4] {
        let ch = |i: usize| ((a[i] as u16 * wa + b[i] as u16 * wb) / div) as u8;
        [ch(0), ch(1), ch(2), 255]
    };
    let palette = if c0 > c1 || !punch_through {
        [a, b, mix(2, 1, 3), mix(1, 2, 3)]
    } else {
        [a, b, mix(1, 1, 2), [0, 0, 0, 0]]
    };

    for (i, px) in tile.iter_mut().enumerate() {
        *px = palette[((indices >> (2 * i)) & 0b11) as usize];
    }
}

fn decode_bc1(src: &[u8], tile: &mut [[u8; 4]; 16]) {
    decode_color_block(src, true, tile);
}

fn decode_bc3(src: &[u8], tile: &mut [[u8; 4]; 16]) {
    let (a0, a1) = (src[0] as u16, src[1] as u16);
    let mut alphas = [0u8; 8];
    alphas[0] = a0 as u8;
    alphas[1] = a1 as u8;
    if a0 > a1 {
        for i in 1..7u16 {
            alphas[i as usize + 1] = (((7 - i) * a0 + i * a1) / 7) as u8;
        }
    } else {
        for i in 1..5u16 {
            alphas[i as usize + 1] = (((5 - i) * a0 + i * a1) / 5) as u8;
        }
        alphas[6] = 0;
        alphas[7] = 255;
    }
    let bits = LittleEndian::read_u48(&src[2..8]);

    decode_color_block(&src[8..16], false, tile);
    for (i, px) in tile.iter_mut().enumerate() {
        px[3] = alphas[((bits >> (3 * i)) & 0b111) as usize];
    }
}
