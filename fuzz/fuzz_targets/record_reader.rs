#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use passiverecon_pipeline::{InputFormat, RecordReader};

fuzz_target!(|data: &[u8]| {
    let reader = RecordReader::new(Cursor::new(data), InputFormat::Auto);
    for _ in reader {}
});
