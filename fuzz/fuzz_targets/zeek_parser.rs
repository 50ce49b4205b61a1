#![no_main]

use libfuzzer_sys::fuzz_target;
use passiverecon_pipeline::parser::ZeekParser;

fuzz_target!(|data: &[u8]| {
    // 헤더와 데이터 줄이 섞인 임의 입력을 줄 단위로 처리
    let text = String::from_utf8_lossy(data);
    let mut parser = ZeekParser::new();
    for (idx, line) in text.lines().enumerate() {
        let _ = parser.parse_line(line, idx as u64 + 1);
    }
});
