//! Builds synthetic big-endian `.casmhd`/`.casmda` pairs on disk.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub const TERRAIN_MODELS: usize = 6;
pub const OBJECT_MODELS: usize = 8;
pub const COLLISIONS: usize = 10;
pub const SKYBOX_MODELS: usize = 12;
pub const OBJECT_BUFFERS: usize = 20;
pub const OBJECT_TEXTURES: usize = 22;
pub const COLLISION_NAMES: usize = 24;
pub const TGLD_NAMES: usize = 31;
pub const TGLD_INTERNAL: usize = 33;
pub const TGLD: usize = 34;
pub const CACHED_TEXTURES: usize = 36;
pub const TERRAIN_TEXTURES: usize = 38;
pub const BVSC: usize = 40;
pub const LCMD_OFFSET: usize = 42;
pub const LCMD_SIZE: usize = 43;
pub const EFFECTS: usize = 44;
pub const TERRAIN_LODS: usize = 46;
pub const TERRAIN_BUFFERS: usize = 51;
pub const CEMS: usize = 53;

const ROOT_WORDS: usize = 54;

/// A `(offset, size)` pair in the companion file.
pub type Range = (u32, u32);

pub fn data_file((offset, size): Range) -> Vec<u32> {
    vec![offset, size]
}

pub fn skybox((offset, size): Range) -> Vec<u32> {
    let mut record = vec![0; 13];
    record.extend([offset, size]);
    record
}

pub fn object((offset, size): Range) -> Vec<u32> {
    let mut record = skybox((offset, size));
    record.push(0);
    record
}

pub fn terrain((offset, size): Range) -> Vec<u32> {
    let mut record = vec![0; 13];
    record.extend([offset, size]);
    record.extend([0; 4]);
    record
}

pub fn terrain_lod((offset, size): Range) -> Vec<u32> {
    let mut record = vec![0; 10];
    record.extend([offset, size]);
    record.extend([0; 6]);
    record
}

pub fn collision((offset, size): Range, name_offset: u32) -> Vec<u32> {
    let mut record = skybox((offset, size));
    record.extend([0, 0, 0, name_offset, 0, 0, 0]);
    record
}

pub fn object_texture(mid: Range, near: Range) -> Vec<u32> {
    vec![mid.0, mid.1, near.0, near.1, 0]
}

pub fn tgld((offset, size): Range) -> Vec<u32> {
    let mut record = vec![0; 6];
    record.extend([offset, size]);
    record.extend([0; 6]);
    record
}

pub fn be_words(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

pub struct ContainerBuilder {
    magic: [u8; 4],
    words: [u32; ROOT_WORDS],
    body: Vec<u8>,
    data: Vec<u8>,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self {
            magic: *b"MSMD",
            words: [0; ROOT_WORDS],
            body: Vec::new(),
            data: Vec::new(),
        }
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn magic(&mut self, magic: &[u8; 4]) -> &mut Self {
        self.magic = *magic;
        self
    }

    pub fn set(&mut self, word: usize, value: u32) -> &mut Self {
        self.words[word] = value;
        self
    }

    /// Offset the next root byte will land at.
    pub fn cursor(&self) -> u32 {
        (ROOT_WORDS * 4 + self.body.len()) as u32
    }

    /// Append raw bytes to the root buffer and return their offset.
    pub fn root_bytes(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.cursor();
        self.body.extend_from_slice(bytes);
        offset
    }

    /// Append a table and point the `(count, offset)` pair at `word` to it.
    pub fn table(&mut self, word: usize, records: &[Vec<u32>]) -> &mut Self {
        let offset = self.cursor();
        for record in records {
            self.body.extend_from_slice(&be_words(record));
        }
        self.words[word] = records.len() as u32;
        self.words[word + 1] = offset;
        self
    }

    /// Append `bytes` to the companion file, 16-byte aligned.
    pub fn data(&mut self, bytes: &[u8]) -> Range {
        self.data.resize(self.data.len().next_multiple_of(16), 0);
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(bytes);
        (offset, bytes.len() as u32)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut words = self.words;
        words[0] = u32::from_be_bytes(self.magic);
        let mut out = be_words(&words);
        out.extend_from_slice(&self.body);
        out
    }

    /// Write `<stem>.casmhd` and `<stem>.casmda` into `dir`, returning the container path.
    pub fn write(&self, dir: &Path, stem: &str) -> PathBuf {
        let container = dir.join(format!("{stem}.casmhd"));
        std::fs::write(&container, self.to_bytes()).unwrap();
        std::fs::write(dir.join(format!("{stem}.casmda")), &self.data).unwrap();
        container
    }
}

/// Every file under `dir`, relative to it, sorted.
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                out.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }

    let mut out = Vec::new();
    walk(dir, dir, &mut out);
    out.sort();
    out
}
