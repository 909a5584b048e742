/// Memory-mapped backing for the companion data file
pub mod mmap;
