//! Byte oriented AES-256 in ECB mode, with the round keys expanded on the fly.
//!
//! The state is the usual column-major 4x4 byte matrix, `buf[row + 4 * col]`.
//! Each block is encrypted in place. Blocks are independent, which makes
//! encrypting them in parallel the only legal reordering.
use polyverify::{shape::ensure_len, Error, Init, Kernel, Output, Schedule};
use rand::Rng;

pub const NAME: &str = "aes";

pub const KEY_LEN: usize = 32;
pub const BLOCK_LEN: usize = 16;

const fn build_sbox() -> [u8; 256] {
    let mut sbox = [0u8; 256];
    let mut p: u8 = 1;
    let mut q: u8 = 1;
    loop {
        // p *= 3
        p = p ^ (p << 1) ^ if p & 0x80 != 0 { 0x1b } else { 0 };
        // q /= 3
        q ^= q << 1;
        q ^= q << 2;
        q ^= q << 4;
        if q & 0x80 != 0 {
            q ^= 0x09;
        }
        let x = q ^ q.rotate_left(1) ^ q.rotate_left(2) ^ q.rotate_left(3) ^ q.rotate_left(4);
        sbox[p as usize] = x ^ 0x63;
        if p == 1 {
            break;
        }
    }
    sbox[0] = 0x63;
    sbox
}

/// Forward substitution box.
pub static SBOX: [u8; 256] = build_sbox();

#[inline]
fn sbox(x: u8) -> u8 {
    SBOX[x as usize]
}

#[inline]
fn xtime(x: u8) -> u8 {
    if x & 0x80 != 0 {
        (x << 1) ^ 0x1b
    } else {
        x << 1
    }
}

fn sub_bytes(buf: &mut [u8; BLOCK_LEN]) {
    for byte in buf.iter_mut() {
        *byte = sbox(*byte);
    }
}

fn add_round_key(buf: &mut [u8; BLOCK_LEN], key: &[u8]) {
    for (byte, k) in buf.iter_mut().zip(key) {
        *byte ^= k;
    }
}

/// Adds the first half of `key` and copies all of it into `copy`.
fn add_round_key_copy(buf: &mut [u8; BLOCK_LEN], key: &[u8; KEY_LEN], copy: &mut [u8; KEY_LEN]) {
    copy.copy_from_slice(key);
    add_round_key(buf, &key[..BLOCK_LEN]);
}

fn shift_rows(buf: &mut [u8; BLOCK_LEN]) {
    // row 1 rotates left by one
    let t = buf[1];
    buf[1] = buf[5];
    buf[5] = buf[9];
    buf[9] = buf[13];
    buf[13] = t;
    // row 2 by two
    buf.swap(2, 10);
    buf.swap(6, 14);
    // row 3 by three
    let t = buf[3];
    buf[3] = buf[15];
    buf[15] = buf[11];
    buf[11] = buf[7];
    buf[7] = t;
}

fn mix_columns(buf: &mut [u8; BLOCK_LEN]) {
    for col in buf.chunks_exact_mut(4) {
        let (a, b, c, d) = (col[0], col[1], col[2], col[3]);
        let e = a ^ b ^ c ^ d;
        col[0] ^= e ^ xtime(a ^ b);
        col[1] ^= e ^ xtime(b ^ c);
        col[2] ^= e ^ xtime(c ^ d);
        col[3] ^= e ^ xtime(d ^ a);
    }
}

/// Advances a 256-bit key by two round keys.
fn expand_enc_key(k: &mut [u8; KEY_LEN], rcon: &mut u8) {
    k[0] ^= sbox(k[29]) ^ *rcon;
    k[1] ^= sbox(k[30]);
    k[2] ^= sbox(k[31]);
    k[3] ^= sbox(k[28]);
    *rcon = xtime(*rcon);
    for i in (4..16).step_by(4) {
        k[i] ^= k[i - 4];
        k[i + 1] ^= k[i - 3];
        k[i + 2] ^= k[i - 2];
        k[i + 3] ^= k[i - 1];
    }
    k[16] ^= sbox(k[12]);
    k[17] ^= sbox(k[13]);
    k[18] ^= sbox(k[14]);
    k[19] ^= sbox(k[15]);
    for i in (20..32).step_by(4) {
        k[i] ^= k[i - 4];
        k[i + 1] ^= k[i - 3];
        k[i + 2] ^= k[i - 2];
        k[i + 3] ^= k[i - 1];
    }
}

/// Key material of one encryption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aes256Context {
    pub enckey: [u8; KEY_LEN],
    /// Last round key, the starting point of a decryption.
    pub deckey: [u8; KEY_LEN],
    /// Round key of the current round.
    pub key: [u8; KEY_LEN],
}

/// Encrypts one block in place.
pub fn encrypt_ecb(ctx: &mut Aes256Context, k: &[u8; KEY_LEN], buf: &mut [u8; BLOCK_LEN]) {
    ctx.enckey = *k;
    ctx.deckey = *k;
    let mut rcon = 1u8;
    for _ in 0..7 {
        expand_enc_key(&mut ctx.deckey, &mut rcon);
    }

    add_round_key_copy(buf, &ctx.enckey, &mut ctx.key);
    rcon = 1;
    for round in 1..14 {
        sub_bytes(buf);
        shift_rows(buf);
        mix_columns(buf);
        if round & 1 == 1 {
            add_round_key(buf, &ctx.key[BLOCK_LEN..]);
        } else {
            expand_enc_key(&mut ctx.key, &mut rcon);
            add_round_key(buf, &ctx.key[..BLOCK_LEN]);
        }
    }
    sub_bytes(buf);
    shift_rows(buf);
    expand_enc_key(&mut ctx.key, &mut rcon);
    add_round_key(buf, &ctx.key[..BLOCK_LEN]);
}

pub fn reference(key: &[u8; KEY_LEN], blocks: &mut [[u8; BLOCK_LEN]]) {
    let mut ctx = Aes256Context::default();
    for block in blocks {
        encrypt_ecb(&mut ctx, key, block);
    }
}

fn parallel(key: &[u8; KEY_LEN], blocks: &mut [[u8; BLOCK_LEN]]) {
    let encrypted = polyverify::parallel::map_range(blocks.len(), |i| {
        let mut ctx = Aes256Context::default();
        let mut block = blocks[i];
        encrypt_ecb(&mut ctx, key, &mut block);
        block
    });
    blocks.copy_from_slice(&encrypted);
}

pub fn run(
    schedule: Schedule,
    key: &[u8; KEY_LEN],
    blocks: &mut [[u8; BLOCK_LEN]],
) -> Result<(), Error> {
    match schedule {
        Schedule::Reference => reference(key, blocks),
        Schedule::Parallel => parallel(key, blocks),
        other => return Err(crate::unsupported(NAME, other)),
    }
    Ok(())
}

/// Parses a hex string of exactly `N` bytes.
pub fn from_hex<const N: usize>(name: &'static str, hex: &str) -> Result<[u8; N], Error> {
    let digits: Vec<u8> = hex
        .as_bytes()
        .chunks(2)
        .map_while(|pair| std::str::from_utf8(pair).ok())
        .map_while(|pair| u8::from_str_radix(pair, 16).ok())
        .collect();
    ensure_len(name, &digits, N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(&digits);
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub blocks: usize,
}

impl Default for Dims {
    fn default() -> Self {
        Self { blocks: 1 }
    }
}

#[derive(Debug, Clone)]
pub struct State {
    pub key: [u8; KEY_LEN],
    pub blocks: Vec<[u8; BLOCK_LEN]>,
}

#[derive(Debug, Clone, Default)]
pub struct Aes {
    pub dims: Dims,
}

impl Aes {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self { dims }
    }
}

impl Kernel for Aes {
    type State = State;

    fn name(&self) -> &'static str {
        NAME
    }

    fn schedules(&self) -> Vec<Schedule> {
        vec![Schedule::Reference, Schedule::Parallel]
    }

    fn scales(&self) -> &'static [f64] {
        &[1.0]
    }

    fn init(&self, init: &mut Init) -> State {
        let rng = init.rng();
        State {
            key: rng.gen(),
            blocks: (0..self.dims.blocks).map(|_| rng.gen()).collect(),
        }
    }

    fn run(&self, schedule: Schedule, state: &mut State) -> Result<(), Error> {
        run(schedule, &state.key, &mut state.blocks)
    }

    fn outputs(&self, state: &State) -> Vec<Output> {
        vec![Output::bytes("buf", state.blocks.concat().as_slice())]
    }
}
