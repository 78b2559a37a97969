#![no_main]
use std::time::Duration;

use bpr_core::CommandParser;
use bpr_core::mocks::ScriptedLink;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut link = ScriptedLink::new(data);
    let mut parser = CommandParser::new(Duration::ZERO);
    // Each decoded command consumes at least its lead byte
    let mut budget = data.len() + 1;
    while let Ok(Some(cmd)) = parser.next_command(&mut link) {
        if let bpr_core::Command::Set(_, value) = cmd {
            let _ = value.to_wire();
        }
        budget -= 1;
        assert!(budget > 0, "parser made no progress");
    }
    assert_eq!(link.remaining(), 0);
});
